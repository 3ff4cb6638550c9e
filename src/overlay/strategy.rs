use crate::capture::FrameSource;
use image::{imageops, Rgba, RgbaImage};
use std::time::{Duration, Instant};

/// Raster size used when the source has not reported its dimensions yet
const COPY_FALLBACK_SIZE: (u32, u32) = (640, 480);
/// Delay before the first copy after binding a source
const COPY_START_DELAY: Duration = Duration::from_millis(100);

/// How the overlay source is turned into something the compositor can sample
///
/// Chosen once at startup from [`PlatformCaps`]; every strategy offers the
/// same acquire / sample / teardown contract.
pub trait FrameSourceStrategy {
    fn name(&self) -> &'static str;

    /// Bind to a (new) overlay source
    fn acquire(&mut self, source: &dyn FrameSource, now: Instant);

    /// Per display-refresh work
    fn tick(&mut self, _source: &dyn FrameSource, _now: Instant) {}

    /// The source started playing again after a pause or end
    fn resume(&mut self, _now: Instant) {}

    /// The image the compositor should sample this frame
    fn as_texture<'a>(&'a self, source: &'a dyn FrameSource) -> Option<&'a RgbaImage>;

    /// Release per-source resources
    fn teardown(&mut self);
}

/// Capabilities probed once at startup
#[derive(Debug, Clone, Copy)]
pub struct PlatformCaps {
    /// The platform can sample the overlay source directly every frame
    pub direct_video_sampling: bool,
}

impl PlatformCaps {
    /// Direct sampling is assumed unless forced off by flag or
    /// `ARBOOTH_COPY_STRATEGY=1`
    pub fn probe(force_copy: bool) -> Self {
        let env_copy = std::env::var("ARBOOTH_COPY_STRATEGY")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self {
            direct_video_sampling: !(force_copy || env_copy),
        }
    }
}

pub fn select_strategy(caps: PlatformCaps) -> Box<dyn FrameSourceStrategy> {
    if caps.direct_video_sampling {
        Box::new(DirectStrategy)
    } else {
        Box::new(CopyStrategy::default())
    }
}

/// Samples the source's current frame with no intermediate copy
pub struct DirectStrategy;

impl FrameSourceStrategy for DirectStrategy {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn acquire(&mut self, _source: &dyn FrameSource, _now: Instant) {}

    fn as_texture<'a>(&'a self, source: &'a dyn FrameSource) -> Option<&'a RgbaImage> {
        source.current_frame()
    }

    fn teardown(&mut self) {}
}

/// Redraws the source into a fixed-size raster every display tick
///
/// The loop reschedules itself only while the source plays, and never starts
/// a copy while a previous one is still in flight.
#[derive(Default)]
pub struct CopyStrategy {
    raster: Option<RgbaImage>,
    next_copy_at: Option<Instant>,
    in_flight: bool,
    copies: u64,
}

impl CopyStrategy {
    #[cfg(test)]
    fn is_scheduled(&self) -> bool {
        self.next_copy_at.is_some()
    }

    #[cfg(test)]
    fn copies(&self) -> u64 {
        self.copies
    }

    fn copy_frame(&mut self, source: &dyn FrameSource) {
        let Some(raster) = self.raster.as_mut() else {
            return;
        };
        let Some(frame) = source.current_frame() else {
            tracing::debug!("Copy tick skipped: overlay has no frame yet");
            return;
        };

        for pixel in raster.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
        if frame.dimensions() == raster.dimensions() {
            imageops::replace(raster, frame, 0, 0);
        } else {
            let scaled = imageops::resize(
                frame,
                raster.width(),
                raster.height(),
                imageops::FilterType::Triangle,
            );
            imageops::replace(raster, &scaled, 0, 0);
        }
        self.copies += 1;
    }
}

impl FrameSourceStrategy for CopyStrategy {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn acquire(&mut self, source: &dyn FrameSource, now: Instant) {
        let (w, h) = match source.resolution() {
            (0, _) | (_, 0) => COPY_FALLBACK_SIZE,
            dims => dims,
        };
        tracing::info!("Copy strategy raster {}x{}", w, h);
        self.raster = Some(RgbaImage::new(w, h));
        self.in_flight = false;
        self.next_copy_at = Some(now + COPY_START_DELAY);
    }

    fn tick(&mut self, source: &dyn FrameSource, now: Instant) {
        let Some(due) = self.next_copy_at else {
            return;
        };
        if now < due || self.in_flight {
            return;
        }
        if !source.is_playing() {
            tracing::debug!("Overlay paused or ended, copy loop stopped");
            self.next_copy_at = None;
            return;
        }

        self.in_flight = true;
        self.copy_frame(source);
        self.in_flight = false;
        self.next_copy_at = Some(now);
    }

    fn resume(&mut self, now: Instant) {
        if self.raster.is_some() && self.next_copy_at.is_none() {
            self.next_copy_at = Some(now);
        }
    }

    fn as_texture<'a>(&'a self, _source: &'a dyn FrameSource) -> Option<&'a RgbaImage> {
        self.raster.as_ref()
    }

    fn teardown(&mut self) {
        tracing::debug!("Copy strategy released after {} copies", self.copies);
        self.next_copy_at = None;
        self.raster = None;
        self.in_flight = false;
    }
}
