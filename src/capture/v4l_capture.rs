use super::{CameraError, FrameSource};
use anyhow::{Context, Result};
use image::{DynamicImage, RgbaImage};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use std::time::Instant;

/// Live webcam held for the whole session
pub struct WebcamCapture {
    camera: Camera,
    latest: Option<RgbaImage>,
}

impl WebcamCapture {
    /// Open the camera, asking for the closest format to `width`x`height`
    pub fn open(device_index: u32, width: u32, height: u32) -> Result<Self, CameraError> {
        tracing::info!(
            "Initializing webcam {} at ideal {}x{}",
            device_index,
            width,
            height
        );

        let devices = nokhwa::query(ApiBackend::Auto).map_err(|e| CameraError::classify(&e))?;
        if devices.is_empty() {
            return Err(CameraError::DeviceNotFound);
        }
        tracing::debug!("{} camera device(s) available", devices.len());

        let index = CameraIndex::Index(device_index);
        let ideal = CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, 30);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(ideal));

        let mut camera = Camera::new(index, requested).map_err(|e| CameraError::classify(&e))?;
        camera
            .open_stream()
            .map_err(|e| CameraError::classify(&e))?;

        let resolution = camera.resolution();
        tracing::info!(
            "Webcam initialized at {}x{}",
            resolution.width(),
            resolution.height()
        );

        Ok(Self {
            camera,
            latest: None,
        })
    }

    fn capture_frame(&mut self) -> Result<RgbaImage> {
        let frame = self.camera.frame().context("Failed to capture frame")?;

        let decoded = frame
            .decode_image::<RgbFormat>()
            .context("Failed to decode frame")?;

        Ok(DynamicImage::ImageRgb8(decoded).to_rgba8())
    }
}

impl FrameSource for WebcamCapture {
    fn poll(&mut self, _now: Instant) -> Result<()> {
        let frame = self.capture_frame()?;
        self.latest = Some(frame);
        Ok(())
    }

    fn current_frame(&self) -> Option<&RgbaImage> {
        self.latest.as_ref()
    }

    fn resolution(&self) -> (u32, u32) {
        self.latest
            .as_ref()
            .map(|frame| frame.dimensions())
            .unwrap_or((0, 0))
    }
}

impl Drop for WebcamCapture {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            tracing::warn!("Failed to stop camera stream: {}", e);
        }
    }
}
