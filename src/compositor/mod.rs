mod geometry;

pub use geometry::{place_plane, surface_size, PlaneRect};

use crate::keying::{key_rgba8, KeyColorConfig, KeyColorUpdate};
use crate::overlay::OverlayTexture;
use image::{imageops, Rgba, RgbaImage};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ReadbackError {
    #[error("render surface is empty ({0}x{1})")]
    EmptySurface(u32, u32),
}

/// The drawable the compositor renders into every frame
pub struct RenderSurface {
    image: RgbaImage,
}

impl RenderSurface {
    fn new(size: (u32, u32)) -> Self {
        Self {
            image: RgbaImage::new(size.0, size.1),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }
}

/// Owns the render surface and draws the keyed overlay plane onto it
pub struct Compositor {
    surface: RenderSurface,
    pixel_ratio: f32,
    offset_fraction: f32,
    keying: KeyColorConfig,
    overlay_dims: (u32, u32),
    plane: PlaneRect,
    /// Keyed overlay at plane size, rebuilt when the texture or keying changes
    keyed: Option<RgbaImage>,
    stale: bool,
    frames: u64,
}

impl Compositor {
    pub fn new(
        viewport: (u32, u32),
        pixel_ratio: f32,
        offset_fraction: f32,
        keying: KeyColorConfig,
    ) -> Self {
        let size = surface_size(viewport, pixel_ratio);
        tracing::info!(
            "Compositor surface {}x{} (viewport {}x{})",
            size.0,
            size.1,
            viewport.0,
            viewport.1
        );
        Self {
            surface: RenderSurface::new(size),
            pixel_ratio,
            offset_fraction,
            keying,
            overlay_dims: (0, 0),
            plane: place_plane((0, 0), size, offset_fraction),
            keyed: None,
            stale: true,
            frames: 0,
        }
    }

    /// Resize the surface and rebuild the plane
    ///
    /// The overlay texture is owned elsewhere, so its binding survives.
    pub fn resize(&mut self, viewport: (u32, u32)) {
        let size = surface_size(viewport, self.pixel_ratio);
        self.surface = RenderSurface::new(size);
        self.rebuild_plane();
        tracing::info!(
            "Surface resized to {}x{}, plane {}x{} at ({}, {})",
            size.0,
            size.1,
            self.plane.width,
            self.plane.height,
            self.plane.x,
            self.plane.y
        );
    }

    pub fn set_offset(&mut self, offset_fraction: f32) {
        self.offset_fraction = offset_fraction;
        self.rebuild_plane();
    }

    /// Live keying update, picked up by the next render
    pub fn update_keying(&mut self, update: &KeyColorUpdate) {
        self.keying.apply(update);
        self.stale = true;
        tracing::debug!(
            "Keying updated: similarity={:.3} smoothness={:.3}",
            self.keying.similarity(),
            self.keying.smoothness()
        );
    }

    pub fn toggle_debug(&mut self) -> bool {
        self.keying.debug_mode = !self.keying.debug_mode;
        self.stale = true;
        tracing::info!("Keying debug mode {}", self.keying.debug_mode);
        self.keying.debug_mode
    }

    pub fn keying(&self) -> &KeyColorConfig {
        &self.keying
    }

    #[cfg(test)]
    pub fn plane(&self) -> PlaneRect {
        self.plane
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    fn rebuild_plane(&mut self) {
        self.plane = place_plane(
            self.overlay_dims,
            self.surface.dimensions(),
            self.offset_fraction,
        );
        self.stale = true;
    }

    /// Draw one frame: clear, then the keyed overlay plane
    ///
    /// The plane is re-keyed only when the texture was marked dirty or the
    /// geometry or keying changed since the last render.
    pub fn render(&mut self, texture: &mut OverlayTexture) {
        let _span = tracing::debug_span!("render").entered();

        if texture.take_dirty() {
            if texture.resolution() != self.overlay_dims {
                self.overlay_dims = texture.resolution();
                self.rebuild_plane();
            }
            self.stale = true;
        }
        if self.stale {
            self.keyed = self.key_plane(texture);
            self.stale = false;
        }

        self.surface.clear();
        self.frames += 1;
        if let Some(plane) = &self.keyed {
            imageops::replace(&mut self.surface.image, plane, self.plane.x, self.plane.y);
        }
    }

    fn key_plane(&self, texture: &OverlayTexture) -> Option<RgbaImage> {
        let source = texture.image()?;
        if self.plane.width == 0 || self.plane.height == 0 || source.width() == 0 {
            return None;
        }

        let mut plane = if source.dimensions() == (self.plane.width, self.plane.height) {
            source.clone()
        } else {
            imageops::resize(
                source,
                self.plane.width,
                self.plane.height,
                imageops::FilterType::Triangle,
            )
        };
        for pixel in plane.pixels_mut() {
            key_rgba8(&mut pixel.0, &self.keying);
        }
        Some(plane)
    }

    /// Current surface contents for capture
    pub fn read_back(&self) -> Result<&RgbaImage, ReadbackError> {
        let (w, h) = self.surface.dimensions();
        if w == 0 || h == 0 {
            return Err(ReadbackError::EmptySurface(w, h));
        }
        Ok(&self.surface.image)
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.surface.dimensions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keying::parse_hex_color;
    use crate::overlay::{select_strategy, OverlayClip, PlatformCaps};
    use std::time::{Duration, Instant};

    fn texture(image: RgbaImage) -> OverlayTexture {
        OverlayTexture::new(
            OverlayClip::still(image),
            select_strategy(PlatformCaps {
                direct_video_sampling: true,
            }),
            false,
            Instant::now(),
        )
    }

    fn green_keyed() -> KeyColorConfig {
        KeyColorConfig::new(parse_hex_color("#00ff00").unwrap(), 0.15, 0.05)
    }

    #[test]
    fn test_render_keys_out_green() {
        let mut overlay = RgbaImage::from_pixel(10, 10, Rgba([0, 255, 0, 255]));
        overlay.put_pixel(5, 5, Rgba([255, 0, 0, 255]));
        let mut texture = texture(overlay);
        let mut compositor = Compositor::new((10, 10), 1.0, 0.0, green_keyed());
        compositor.render(&mut texture);

        let surface = compositor.read_back().unwrap();
        assert_eq!(surface.get_pixel(0, 0)[3], 0);
        assert_eq!(*surface.get_pixel(5, 5), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_debug_mode_renders_opaque() {
        let mut texture = texture(RgbaImage::from_pixel(4, 4, Rgba([0, 255, 0, 255])));
        let mut compositor = Compositor::new((4, 4), 1.0, 0.0, green_keyed());
        assert!(compositor.toggle_debug());
        compositor.render(&mut texture);
        assert_eq!(compositor.read_back().unwrap().get_pixel(1, 1)[3], 255);
    }

    #[test]
    fn test_plane_follows_overlay_aspect_and_resize() {
        let mut texture = texture(RgbaImage::from_pixel(200, 100, Rgba([255, 0, 0, 255])));
        let mut compositor = Compositor::new((100, 100), 1.0, 0.0, green_keyed());
        compositor.render(&mut texture);
        assert_eq!(compositor.plane().width, 100);
        assert_eq!(compositor.plane().height, 50);

        compositor.resize((400, 100));
        assert_eq!(compositor.surface_size(), (400, 100));
        assert_eq!(compositor.plane().width, 200);
        assert_eq!(compositor.plane().height, 100);

        // texture binding survives the resize
        compositor.render(&mut texture);
        assert_eq!(compositor.read_back().unwrap().get_pixel(200, 50)[3], 255);
    }

    #[test]
    fn test_live_update_applies_next_frame() {
        let mut texture = texture(RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])));
        let mut compositor = Compositor::new((4, 4), 1.0, 0.0, green_keyed());
        compositor.render(&mut texture);
        assert_eq!(compositor.read_back().unwrap().get_pixel(0, 0)[3], 255);

        compositor.update_keying(&KeyColorUpdate {
            key_color: Some([1.0, 0.0, 0.0]),
            ..Default::default()
        });
        compositor.render(&mut texture);
        assert_eq!(compositor.read_back().unwrap().get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_clean_texture_reuses_keyed_plane() {
        let t0 = Instant::now();
        let mut texture = texture(RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])));
        let mut compositor = Compositor::new((4, 4), 1.0, 0.0, green_keyed());
        compositor.render(&mut texture);
        assert!(!texture.take_dirty());

        // a swap without a tick is only picked up once the texture is dirty
        texture.replace(
            OverlayClip::still(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]))),
            false,
            t0,
        );
        texture.take_dirty();
        compositor.render(&mut texture);
        assert_eq!(*compositor.read_back().unwrap().get_pixel(1, 1), Rgba([255, 0, 0, 255]));

        texture.tick(t0 + Duration::from_millis(16));
        compositor.render(&mut texture);
        assert_eq!(*compositor.read_back().unwrap().get_pixel(1, 1), Rgba([0, 0, 255, 255]));
        assert_eq!(compositor.frames_rendered(), 3);
    }

    #[test]
    fn test_empty_surface_readback_fails() {
        let compositor = Compositor::new((0, 0), 1.0, 0.0, green_keyed());
        assert_eq!(
            compositor.read_back().unwrap_err(),
            ReadbackError::EmptySurface(0, 0)
        );
    }
}
