/// Maximum device pixel ratio honoured when sizing the surface
pub const MAX_PIXEL_RATIO: f32 = 1.5;

/// Placement of the overlay plane on the render surface, in surface pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Surface size for a viewport at the given pixel ratio
pub fn surface_size(viewport: (u32, u32), pixel_ratio: f32) -> (u32, u32) {
    let ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
        pixel_ratio.min(MAX_PIXEL_RATIO)
    } else {
        1.0
    };
    (
        (viewport.0 as f32 * ratio).round() as u32,
        (viewport.1 as f32 * ratio).round() as u32,
    )
}

/// Plane size that preserves the overlay aspect inside the surface
///
/// A wider overlay is constrained by width, a taller one by height. Unknown
/// overlay dimensions fill the whole surface.
pub fn fit_plane(overlay: (u32, u32), surface: (u32, u32)) -> (f32, f32) {
    let (sw, sh) = (surface.0 as f32, surface.1 as f32);
    if overlay.0 == 0 || overlay.1 == 0 || surface.0 == 0 || surface.1 == 0 {
        return (sw, sh);
    }
    let overlay_aspect = overlay.0 as f32 / overlay.1 as f32;
    let surface_aspect = sw / sh;
    if overlay_aspect > surface_aspect {
        (sw, sw / overlay_aspect)
    } else {
        (sh * overlay_aspect, sh)
    }
}

/// Centered plane shifted left by `offset_fraction` of the surface width
pub fn place_plane(overlay: (u32, u32), surface: (u32, u32), offset_fraction: f32) -> PlaneRect {
    let (w, h) = fit_plane(overlay, surface);
    let shift = offset_fraction * surface.0 as f32;
    PlaneRect {
        x: ((surface.0 as f32 - w) / 2.0 - shift).round() as i64,
        y: ((surface.1 as f32 - h) / 2.0).round() as i64,
        width: w.round() as u32,
        height: h.round() as u32,
    }
}
