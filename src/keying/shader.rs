use super::types::{KeyColorConfig, Rgb};

/// Hue and saturation of an RGB color, both in [0, 1]
///
/// Value is not needed for masking and is not computed. Achromatic colors
/// (max == min) have hue 0.
pub fn hue_sat(c: Rgb) -> (f32, f32) {
    let [r, g, b] = c;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta > 0.0 {
        let sector = if max == r {
            ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            (b - r) / delta + 2.0
        } else {
            (r - g) / delta + 4.0
        };
        sector / 6.0
    } else {
        0.0
    };

    let sat = if max > 0.0 { delta / max } else { 0.0 };
    (hue, sat)
}

/// Distance between two hues on the unit circle, in [0, 0.5]
pub fn hue_distance(h1: f32, h2: f32) -> f32 {
    let d = (h1 - h2).abs();
    d.min(1.0 - d)
}

/// Hermite interpolation between `edge0` and `edge1`
///
/// A zero-width band degrades to a step at `edge0`.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if x <= edge0 {
        return 0.0;
    }
    if x >= edge1 {
        return 1.0;
    }
    let t = (x - edge0) / (edge1 - edge0);
    (t * t * (3.0 - 2.0 * t)).clamp(0.0, 1.0)
}

/// Distance of `c` from the key color in hue/saturation space
pub fn chroma_distance(c: Rgb, key: Rgb) -> f32 {
    let (hue, sat) = hue_sat(c);
    let (key_hue, key_sat) = hue_sat(key);
    let hue_dist = hue_distance(hue, key_hue);
    let sat_dist = (sat - key_sat).abs();
    (hue_dist * hue_dist + sat_dist * sat_dist).sqrt()
}

/// Coverage for a given chroma distance: 0 keeps nothing, 1 keeps the pixel
pub fn chroma_mask(distance: f32, config: &KeyColorConfig) -> f32 {
    smoothstep(
        config.similarity() - config.smoothness(),
        config.similarity() + config.smoothness(),
        distance,
    )
}

/// Key a single RGBA pixel (channels in [0, 1])
///
/// Color passes through unchanged; only alpha is scaled by the mask.
pub fn key_pixel(pixel: [f32; 4], config: &KeyColorConfig) -> [f32; 4] {
    let [r, g, b, a] = pixel;
    if config.debug_mode {
        return [r, g, b, 1.0];
    }
    let mask = chroma_mask(chroma_distance([r, g, b], config.key_color), config);
    [r, g, b, a * mask]
}

/// Key an 8-bit RGBA pixel in place
pub fn key_rgba8(pixel: &mut [u8; 4], config: &KeyColorConfig) {
    let unit = pixel.map(|channel| channel as f32 / 255.0);
    let keyed = key_pixel(unit, config);
    // color is untouched, so only alpha is written back
    pixel[3] = (keyed[3] * 255.0).round().clamp(0.0, 255.0) as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb {
        let h6 = (h * 6.0).rem_euclid(6.0);
        let c = v * s;
        let x = c * (1.0 - ((h6 % 2.0) - 1.0).abs());
        let (r, g, b) = match h6 as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = v - c;
        [r + m, g + m, b + m]
    }

    #[test]
    fn test_hue_of_primaries() {
        assert_eq!(hue_sat([1.0, 0.0, 0.0]), (0.0, 1.0));
        let (h, s) = hue_sat([0.0, 1.0, 0.0]);
        assert!((h - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(s, 1.0);
        let (h, _) = hue_sat([0.0, 0.0, 1.0]);
        assert!((h - 2.0 / 3.0).abs() < 1e-6);
        // magenta wraps through the red sector
        let (h, _) = hue_sat([1.0, 0.0, 1.0]);
        assert!((h - 5.0 / 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_achromatic_hue_is_zero() {
        assert_eq!(hue_sat([0.5, 0.5, 0.5]), (0.0, 0.0));
        assert_eq!(hue_sat([0.0, 0.0, 0.0]), (0.0, 0.0));
    }

    #[test]
    fn test_hue_distance_is_circular_and_symmetric() {
        assert!((hue_distance(0.95, 0.05) - 0.1).abs() < 1e-6);
        for i in 0..=20 {
            for j in 0..=20 {
                let (h1, h2) = (i as f32 / 20.0, j as f32 / 20.0);
                let d = hue_distance(h1, h2);
                let expected = (h1 - h2).abs().min(1.0 - (h1 - h2).abs());
                assert!((d - expected).abs() < 1e-6);
                assert_eq!(d, hue_distance(h2, h1));
                assert!((0.0..=0.5).contains(&d));
            }
        }
    }

    #[test]
    fn test_mask_band_edges_and_monotonicity() {
        let config = KeyColorConfig::new([0.0, 1.0, 0.0], 0.5, 0.2);
        assert_eq!(chroma_mask(0.0, &config), 0.0);
        assert_eq!(chroma_mask(0.3, &config), 0.0);
        assert_eq!(chroma_mask(0.7, &config), 1.0);
        assert_eq!(chroma_mask(0.9, &config), 1.0);

        let mut previous = 0.0;
        for i in 0..=1000 {
            let m = chroma_mask(i as f32 / 1000.0, &config);
            assert!(m >= previous);
            // no jumps, including at the band edges
            assert!(m - previous < 0.01);
            previous = m;
        }
    }

    #[test]
    fn test_zero_smoothness_is_hard_edge() {
        let config = KeyColorConfig::new([0.0, 1.0, 0.0], 0.4, 0.0);
        assert_eq!(chroma_mask(0.39, &config), 0.0);
        assert_eq!(chroma_mask(0.41, &config), 1.0);
    }

    #[test]
    fn test_key_color_is_removed() {
        let green = hsv_to_rgb(0.33, 1.0, 1.0);
        let config = KeyColorConfig::new(green, 0.5, 0.2);
        let out = key_pixel([green[0], green[1], green[2], 1.0], &config);
        assert_eq!(out[3], 0.0);
    }

    #[test]
    fn test_red_against_green_key_is_partial() {
        let green = hsv_to_rgb(0.33, 1.0, 1.0);
        let config = KeyColorConfig::new(green, 0.5, 0.2);
        let red = [1.0, 0.0, 0.0];
        let distance = chroma_distance(red, green);
        assert!((distance - 0.33).abs() < 1e-3);

        let out = key_pixel([1.0, 0.0, 0.0, 1.0], &config);
        assert!(out[3] > 0.0 && out[3] < 1.0);
        assert_eq!(&out[..3], &red);
    }

    #[test]
    fn test_debug_mode_forces_opaque() {
        let mut config = KeyColorConfig::new([0.0, 1.0, 0.0], 1.0, 0.5);
        config.debug_mode = true;
        for pixel in [[0.0, 1.0, 0.0, 0.0], [0.2, 0.4, 0.6, 0.5], [1.0, 1.0, 1.0, 1.0]] {
            assert_eq!(key_pixel(pixel, &config)[3], 1.0);
        }
        let mut rgba = [0, 255, 0, 10];
        key_rgba8(&mut rgba, &config);
        assert_eq!(rgba, [0, 255, 0, 255]);
    }

    #[test]
    fn test_key_rgba8_scales_source_alpha() {
        let config = KeyColorConfig::new([0.0, 1.0, 0.0], 0.1, 0.05);
        let mut keyed = [0, 255, 0, 255];
        key_rgba8(&mut keyed, &config);
        assert_eq!(keyed[3], 0);

        let mut kept = [255, 0, 0, 128];
        key_rgba8(&mut kept, &config);
        assert_eq!(kept, [255, 0, 0, 128]);
    }

    #[test]
    fn test_key_rgba8_matches_float_path() {
        let config = KeyColorConfig::new([0.0, 1.0, 0.0], 0.5, 0.2);
        for rgba in [[255u8, 0, 0, 255], [40, 200, 60, 200], [0, 255, 0, 255], [90, 90, 90, 64]] {
            let expected = key_pixel(rgba.map(|c| c as f32 / 255.0), &config)[3];
            let mut keyed = rgba;
            key_rgba8(&mut keyed, &config);
            assert_eq!(&keyed[..3], &rgba[..3]);
            assert_eq!(keyed[3], (expected * 255.0).round() as u8);
        }
    }
}
