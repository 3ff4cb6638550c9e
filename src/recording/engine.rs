use super::cover::{draw_cover, draw_stretched};
use super::encoder::{pick_supported_mime, EncoderFactory, EncoderSettings, EncodingSink};
use super::timers::Timers;
use super::types::{CaptureError, CapturedArtifact};
use crate::compositor::Compositor;
use crate::overlay::OverlayTexture;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::time::{Duration, Instant, SystemTime};

/// Recording tuning, fixed for a session
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    /// Press duration that turns a tap into a recording
    pub long_press: Duration,
    /// Hard cap on recording length
    pub max_duration: Duration,
    pub progress_interval: Duration,
    /// Composite/encode cadence, independent of display refresh
    pub fps: u32,
    /// Cap on the recording raster
    pub max_size: (u32, u32),
    /// How often buffered encoder output is collected
    pub timeslice: Duration,
    pub bits_per_second: u32,
    pub mime_candidates: Vec<&'static str>,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            long_press: Duration::from_millis(350),
            max_duration: Duration::from_millis(8000),
            progress_interval: Duration::from_millis(50),
            fps: 20,
            max_size: (1280, 720),
            timeslice: Duration::from_millis(500),
            bits_per_second: 3_000_000,
            mime_candidates: super::encoder::MIME_CANDIDATES.to_vec(),
        }
    }
}

/// Draw camera (cover fit) then a freshly rendered overlay into `raster`
///
/// A failed overlay read-back leaves the camera layer in place.
fn compose_into(
    raster: &mut RgbaImage,
    camera: Option<&RgbaImage>,
    compositor: &mut Compositor,
    texture: &mut OverlayTexture,
) {
    if let Some(frame) = camera {
        draw_cover(raster, frame);
    }

    compositor.render(texture);
    match compositor.read_back() {
        Ok(surface) => draw_stretched(raster, surface),
        Err(e) => tracing::warn!("Overlay read-back failed, keeping camera layer: {}", e),
    }
}

/// Compose one still at the current surface resolution
pub fn compose_still(
    camera: Option<&RgbaImage>,
    compositor: &mut Compositor,
    texture: &mut OverlayTexture,
) -> RgbaImage {
    let _span = tracing::debug_span!("compose_still").entered();
    let (w, h) = compositor.surface_size();
    let mut raster = RgbaImage::new(w, h);
    compose_into(&mut raster, camera, compositor, texture);
    raster
}

/// Encode a composed still as a PNG photo artifact
pub fn photo_artifact(
    raster: &RgbaImage,
    at: SystemTime,
) -> Result<CapturedArtifact, CaptureError> {
    let mut png = Vec::new();
    raster.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(CapturedArtifact::photo(png, at))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tick {
    Frame,
    Collect,
}

/// Composite loop feeding an encoding sink while a recording is live
///
/// Consumed by [`CompositeRecorder::stop`], so no tick can reach a stopped sink.
pub struct CompositeRecorder {
    raster: RgbaImage,
    sink: Box<dyn EncodingSink>,
    timers: Timers<Tick>,
    frame_interval: Duration,
    timeslice: Duration,
    chunks: Vec<Vec<u8>>,
    started_at: Instant,
    frames: u64,
}

impl CompositeRecorder {
    pub fn start(
        surface: (u32, u32),
        factory: &dyn EncoderFactory,
        config: &RecordingConfig,
        now: Instant,
    ) -> Result<Self, CaptureError> {
        let width = surface.0.min(config.max_size.0);
        let height = surface.1.min(config.max_size.1);
        if width == 0 || height == 0 {
            return Err(CaptureError::Encode(format!(
                "cannot record a {}x{} surface",
                surface.0, surface.1
            )));
        }

        let mime = pick_supported_mime(&config.mime_candidates, factory);
        if !factory.is_type_supported(&mime) {
            return Err(CaptureError::NoSupportedCodec);
        }
        let fps = config.fps.max(1);
        let settings = EncoderSettings {
            width,
            height,
            fps,
            bits_per_second: config.bits_per_second,
        };
        let sink = factory.create(&mime, &settings)?;
        tracing::info!(
            "Recording {}x{} @ {} fps as {} ({} kbit/s)",
            settings.width,
            settings.height,
            settings.fps,
            mime,
            settings.bits_per_second / 1000
        );

        let frame_interval = Duration::from_secs(1) / fps;
        let mut timers = Timers::default();
        timers.schedule(now, Tick::Frame);
        timers.schedule(now + config.timeslice, Tick::Collect);

        Ok(Self {
            raster: RgbaImage::new(width, height),
            sink,
            timers,
            frame_interval,
            timeslice: config.timeslice,
            chunks: Vec::new(),
            started_at: now,
            frames: 0,
        })
    }

    pub fn mime_type(&self) -> &str {
        self.sink.mime_type()
    }

    pub fn raster_size(&self) -> (u32, u32) {
        self.raster.dimensions()
    }

    #[cfg(test)]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn tick(
        &mut self,
        now: Instant,
        camera: Option<&RgbaImage>,
        compositor: &mut Compositor,
        texture: &mut OverlayTexture,
    ) {
        while let Some((due, tick)) = self.timers.pop_due(now) {
            match tick {
                Tick::Frame => {
                    self.draw_frame(now, camera, compositor, texture);
                    self.timers
                        .schedule(next_after(due, self.frame_interval, now), Tick::Frame);
                }
                Tick::Collect => {
                    self.collect();
                    self.timers
                        .schedule(next_after(due, self.timeslice, now), Tick::Collect);
                }
            }
        }
    }

    fn draw_frame(
        &mut self,
        now: Instant,
        camera: Option<&RgbaImage>,
        compositor: &mut Compositor,
        texture: &mut OverlayTexture,
    ) {
        let _span = tracing::debug_span!("record_frame").entered();
        for pixel in self.raster.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
        compose_into(&mut self.raster, camera, compositor, texture);

        let timestamp = now.saturating_duration_since(self.started_at);
        match self.sink.push_frame(&self.raster, timestamp) {
            Ok(()) => self.frames += 1,
            Err(e) => tracing::warn!("Dropped recording frame: {}", e),
        }
    }

    fn collect(&mut self) {
        let data = self.sink.take_data();
        if !data.is_empty() {
            self.chunks.push(data);
        }
    }

    /// Stop the loop and the sink; the artifact is assembled later
    pub fn stop(mut self) -> PendingVideo {
        self.timers.clear();
        if !self.sink.is_active() {
            tracing::debug!("Encoder already inactive, nothing to stop");
        } else if let Err(e) = self.sink.stop() {
            tracing::warn!("Encoder stop failed: {}", e);
        }
        tracing::info!(
            "Recording stopped after {} frame(s), {:.1}s",
            self.frames,
            self.started_at.elapsed().as_secs_f32()
        );
        PendingVideo {
            sink: self.sink,
            chunks: self.chunks,
        }
    }
}

/// Next occurrence of a fixed cadence after `now`, skipping missed ticks
fn next_after(due: Instant, interval: Duration, now: Instant) -> Instant {
    let mut next = due + interval;
    while next <= now {
        next += interval;
    }
    next
}

/// A stopped recording waiting for its sink to flush
pub struct PendingVideo {
    sink: Box<dyn EncodingSink>,
    chunks: Vec<Vec<u8>>,
}

impl PendingVideo {
    /// Gather the flushed data into the final artifact
    pub fn finalize(mut self, at: SystemTime) -> Result<CapturedArtifact, CaptureError> {
        let tail = self.sink.take_data();
        if !tail.is_empty() {
            self.chunks.push(tail);
        }
        if self.chunks.is_empty() {
            return Err(CaptureError::EmptyRecording);
        }

        let payload = self.chunks.concat();
        tracing::info!(
            "Recording saved: {:.2}MB, type: {}",
            payload.len() as f64 / 1024.0 / 1024.0,
            self.sink.mime_type()
        );
        Ok(CapturedArtifact::video(payload, self.sink.mime_type(), at))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::keying::KeyColorConfig;
    use crate::overlay::{select_strategy, OverlayClip, PlatformCaps};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records what the recorder does with its sink
    #[derive(Default)]
    pub struct SinkLog {
        pub frames: Vec<(u32, u32)>,
        pub stops: u32,
        pub sinks_created: u32,
    }

    pub struct FakeSink {
        log: Rc<RefCell<SinkLog>>,
        pending: Vec<u8>,
        active: bool,
        empty: bool,
    }

    impl EncodingSink for FakeSink {
        fn mime_type(&self) -> &str {
            "video/webm"
        }

        fn push_frame(&mut self, frame: &RgbaImage, _ts: Duration) -> Result<(), CaptureError> {
            self.log.borrow_mut().frames.push(frame.dimensions());
            if !self.empty {
                self.pending.push(1);
            }
            Ok(())
        }

        fn take_data(&mut self) -> Vec<u8> {
            std::mem::take(&mut self.pending)
        }

        fn stop(&mut self) -> Result<(), CaptureError> {
            self.active = false;
            self.log.borrow_mut().stops += 1;
            if !self.empty {
                self.pending.push(0xFF);
            }
            Ok(())
        }

        fn is_active(&self) -> bool {
            self.active
        }
    }

    pub struct FakeFactory {
        pub log: Rc<RefCell<SinkLog>>,
        pub supported: bool,
        pub empty: bool,
    }

    impl FakeFactory {
        pub fn new() -> Self {
            Self {
                log: Rc::default(),
                supported: true,
                empty: false,
            }
        }
    }

    impl EncoderFactory for FakeFactory {
        fn is_type_supported(&self, mime: &str) -> bool {
            self.supported && mime == "video/webm"
        }

        fn create(
            &self,
            _mime: &str,
            _settings: &EncoderSettings,
        ) -> Result<Box<dyn EncodingSink>, CaptureError> {
            self.log.borrow_mut().sinks_created += 1;
            Ok(Box::new(FakeSink {
                log: self.log.clone(),
                pending: Vec::new(),
                active: true,
                empty: self.empty,
            }))
        }
    }

    pub fn scene(viewport: (u32, u32)) -> (Compositor, OverlayTexture) {
        let mut overlay = RgbaImage::from_pixel(viewport.0, viewport.1, Rgba([0, 255, 0, 255]));
        overlay.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        let texture = OverlayTexture::new(
            OverlayClip::still(overlay),
            select_strategy(PlatformCaps {
                direct_video_sampling: true,
            }),
            false,
            Instant::now(),
        );
        let keying = KeyColorConfig::new([0.0, 1.0, 0.0], 0.15, 0.05);
        (Compositor::new(viewport, 1.0, 0.0, keying), texture)
    }

    #[test]
    fn test_still_layers_overlay_on_camera() {
        let (mut compositor, mut texture) = scene((8, 8));
        let camera = RgbaImage::from_pixel(16, 8, Rgba([0, 0, 255, 255]));
        let still = compose_still(Some(&camera), &mut compositor, &mut texture);

        assert_eq!(still.dimensions(), (8, 8));
        assert_eq!(*still.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*still.get_pixel(4, 4), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_still_without_camera_has_overlay_only() {
        let (mut compositor, mut texture) = scene((8, 8));
        let still = compose_still(None, &mut compositor, &mut texture);
        assert_eq!(*still.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(still.get_pixel(4, 4)[3], 0);
    }

    #[test]
    fn test_photo_artifact_is_png() {
        let raster = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        let photo = photo_artifact(&raster, SystemTime::now()).unwrap();
        assert!(photo.payload().starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn test_recording_raster_is_capped() {
        let factory = FakeFactory::new();
        let recorder = CompositeRecorder::start(
            (1920, 1200),
            &factory,
            &RecordingConfig::default(),
            Instant::now(),
        )
        .unwrap();
        assert_eq!(recorder.raster_size(), (1280, 720));
        assert_eq!(recorder.mime_type(), "video/webm");
    }

    #[test]
    fn test_recorder_cadence_and_finalize() {
        let factory = FakeFactory::new();
        let (mut compositor, mut texture) = scene((8, 8));
        let t0 = Instant::now();
        let mut recorder =
            CompositeRecorder::start((8, 8), &factory, &RecordingConfig::default(), t0).unwrap();

        // 20 fps: frames at 0, 50, ..., 950 ms
        for ms in (0..1000).step_by(10) {
            recorder.tick(t0 + Duration::from_millis(ms), None, &mut compositor, &mut texture);
        }
        assert_eq!(recorder.frames(), 20);
        assert_eq!(factory.log.borrow().frames.len(), 20);

        let pending = recorder.stop();
        assert_eq!(factory.log.borrow().stops, 1);
        let video = pending.finalize(SystemTime::now()).unwrap();
        assert_eq!(video.payload().len(), 21);
        assert!(video.filename().ends_with(".webm"));
    }

    #[test]
    fn test_inactive_sink_is_not_stopped_twice() {
        let factory = FakeFactory::new();
        let mut recorder =
            CompositeRecorder::start((8, 8), &factory, &RecordingConfig::default(), Instant::now())
                .unwrap();
        recorder.sink.stop().unwrap();
        assert!(!recorder.sink.is_active());

        let video = recorder.stop().finalize(SystemTime::now()).unwrap();
        assert_eq!(factory.log.borrow().stops, 1);
        assert_eq!(video.payload(), &[0xFF]);
    }

    #[test]
    fn test_empty_recording_is_reported() {
        let mut factory = FakeFactory::new();
        factory.empty = true;
        let recorder =
            CompositeRecorder::start((8, 8), &factory, &RecordingConfig::default(), Instant::now())
                .unwrap();
        assert_eq!(
            recorder.stop().finalize(SystemTime::now()).unwrap_err(),
            CaptureError::EmptyRecording
        );
    }

    #[test]
    fn test_no_codec_fails_start() {
        let mut factory = FakeFactory::new();
        factory.supported = false;
        let result =
            CompositeRecorder::start((8, 8), &factory, &RecordingConfig::default(), Instant::now());
        assert!(matches!(result, Err(CaptureError::NoSupportedCodec)));
        assert_eq!(factory.log.borrow().sinks_created, 0);
    }
}
