mod clip;
mod placeholder;
mod strategy;

use clip::load_with_timeout;
pub use clip::{OverlayClip, OverlayLoad, OverlayLoadError};
pub use placeholder::placeholder_clip;
pub use strategy::{select_strategy, FrameSourceStrategy, PlatformCaps};

use crate::capture::FrameSource;
use image::RgbaImage;
use std::path::Path;
use std::time::{Duration, Instant};

/// Load the overlay clip, substituting the placeholder on error or timeout
///
/// Returns the clip and whether it is the placeholder.
pub fn load_overlay(path: &Path, timeout: Duration) -> (OverlayClip, bool) {
    tracing::info!("Loading overlay {}", path.display());
    resolve_overlay(load_with_timeout(path, timeout))
}

/// The loaded clip, or the placeholder when loading failed or timed out
pub fn resolve_overlay(result: Result<OverlayClip, OverlayLoadError>) -> (OverlayClip, bool) {
    match result {
        Ok(clip) => (clip, false),
        Err(e) => {
            tracing::warn!("Overlay unavailable ({}), using placeholder", e);
            (placeholder_clip(), true)
        }
    }
}

/// The overlay clip bound to its sampling strategy
///
/// `needs_update` is the one flag shared between loops; marking it again
/// before it is consumed has no extra effect.
pub struct OverlayTexture {
    clip: OverlayClip,
    strategy: Box<dyn FrameSourceStrategy>,
    needs_update: bool,
    placeholder: bool,
}

impl OverlayTexture {
    pub fn new(
        mut clip: OverlayClip,
        mut strategy: Box<dyn FrameSourceStrategy>,
        placeholder: bool,
        now: Instant,
    ) -> Self {
        clip.play(now);
        strategy.acquire(&clip, now);
        tracing::info!(
            "Overlay texture bound with {} strategy ({}x{}, {}ms loop)",
            strategy.name(),
            clip.resolution().0,
            clip.resolution().1,
            clip.duration().as_millis()
        );
        Self {
            clip,
            strategy,
            needs_update: true,
            placeholder,
        }
    }

    /// Swap in a new overlay asset, keeping the strategy
    pub fn replace(&mut self, mut clip: OverlayClip, placeholder: bool, now: Instant) {
        self.strategy.teardown();
        clip.play(now);
        self.strategy.acquire(&clip, now);
        self.clip = clip;
        self.placeholder = placeholder;
        self.needs_update = true;
    }

    /// Advance playback and run the strategy's per-tick work
    ///
    /// Every display tick may carry a new overlay frame, so the texture is
    /// marked dirty for the next render.
    pub fn tick(&mut self, now: Instant) {
        if let Err(e) = self.clip.poll(now) {
            tracing::warn!("Overlay poll failed: {}", e);
        }
        self.strategy.tick(&self.clip, now);
        self.mark_dirty();
    }

    pub fn play(&mut self, now: Instant) {
        if !self.clip.is_playing() {
            self.clip.play(now);
            self.strategy.resume(now);
        }
    }

    pub fn pause(&mut self, now: Instant) {
        self.clip.pause(now);
    }

    pub fn mark_dirty(&mut self) {
        self.needs_update = true;
    }

    /// Consume the dirty flag
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.needs_update)
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        self.strategy.as_texture(&self.clip)
    }

    /// Native overlay dimensions, (0, 0) when unknown
    pub fn resolution(&self) -> (u32, u32) {
        self.clip.resolution()
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}
