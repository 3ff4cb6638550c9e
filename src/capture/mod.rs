mod error;
mod v4l_capture;

pub use error::CameraError;
pub use v4l_capture::WebcamCapture;

use anyhow::Result;
use image::RgbaImage;
use std::time::Instant;

/// A continuously updating 2D image (camera or overlay clip)
pub trait FrameSource {
    /// Advance the source to `now`, pulling a new frame if one is available
    fn poll(&mut self, now: Instant) -> Result<()>;

    /// Most recent frame, `None` until the source is ready
    fn current_frame(&self) -> Option<&RgbaImage>;

    /// Intrinsic resolution; (0, 0) means "not ready yet", not an error
    fn resolution(&self) -> (u32, u32);

    /// Whether the source is still producing new frames
    fn is_playing(&self) -> bool {
        true
    }
}
