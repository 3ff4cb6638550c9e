mod control;
mod gesture;
mod init;

pub use control::{spawn_control_reader, ControlCommand};
pub use init::Initializer;

use gesture::TapCounter;

use crate::capture::FrameSource;
use crate::compositor::Compositor;
use crate::keying::KeyColorUpdate;
use crate::output::{Download, Preview, Share};
use crate::overlay::{resolve_overlay, OverlayLoad, OverlayTexture};
use crate::recording::types::CaptureError;
use crate::recording::{
    compose_still, draw_cover, draw_stretched, photo_artifact, Command, CompositeRecorder,
    EncoderFactory, Mode, PendingVideo, RecordingConfig, RecordingStateMachine,
};
use image::RgbaImage;
use std::time::{Duration, Instant, SystemTime};

/// Whether the main loop should keep running after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Everything live for one booth session
///
/// Single owner of the recording session: at most one `CompositeRecorder`
/// exists, and a stopped one is finalized exactly once.
pub struct Photobooth {
    camera: Box<dyn FrameSource>,
    compositor: Compositor,
    texture: OverlayTexture,
    /// Replacement overlay still decoding; the current one stays bound
    overlay_load: Option<OverlayLoad>,
    machine: RecordingStateMachine,
    recording: RecordingConfig,
    encoders: Box<dyn EncoderFactory>,
    recorder: Option<CompositeRecorder>,
    pending: Option<PendingVideo>,
    preview: Preview,
    sharer: Box<dyn Share>,
    downloader: Box<dyn Download>,
    taps: TapCounter,
    overlay_timeout: Duration,
    progress: f32,
}

impl Photobooth {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        camera: Box<dyn FrameSource>,
        compositor: Compositor,
        texture: OverlayTexture,
        recording: RecordingConfig,
        encoders: Box<dyn EncoderFactory>,
        sharer: Box<dyn Share>,
        downloader: Box<dyn Download>,
        overlay_timeout: Duration,
    ) -> Self {
        Self {
            camera,
            compositor,
            texture,
            overlay_load: None,
            machine: RecordingStateMachine::new(&recording),
            recording,
            encoders,
            recorder: None,
            pending: None,
            preview: Preview::default(),
            sharer,
            downloader,
            taps: TapCounter::default(),
            overlay_timeout,
            progress: 0.0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.machine.mode()
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    #[cfg(test)]
    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn preview(&self) -> &Preview {
        &self.preview
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// One display-refresh tick: sources, render, then the capture loops
    pub fn frame(&mut self, now: Instant) {
        if let Err(e) = self.camera.poll(now) {
            tracing::warn!("Camera frame dropped: {:#}", e);
        }
        self.poll_overlay_swap(now);
        self.texture.tick(now);
        self.compositor.render(&mut self.texture);

        let commands = self.machine.tick(now);
        self.execute(commands, now);

        if let Some(recorder) = self.recorder.as_mut() {
            recorder.tick(
                now,
                self.camera.current_frame(),
                &mut self.compositor,
                &mut self.texture,
            );
        }

        self.finalize_pending();
    }

    /// Start replacing the overlay without blocking the frame loop
    fn begin_overlay_swap(&mut self, load: OverlayLoad) {
        if self.overlay_load.replace(load).is_some() {
            tracing::info!("Previous overlay load superseded");
        }
    }

    fn poll_overlay_swap(&mut self, now: Instant) {
        let Some(result) = self.overlay_load.as_ref().and_then(|load| load.poll(now)) else {
            return;
        };
        self.overlay_load = None;
        let (clip, placeholder) = resolve_overlay(result);
        self.texture.replace(clip, placeholder, now);
    }

    /// Assemble a stopped recording once its sink has flushed
    fn finalize_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            match pending.finalize(SystemTime::now()) {
                Ok(video) => self.preview.show(video),
                Err(e) => tracing::warn!("Recording discarded: {}", e),
            }
        }
    }

    pub fn press(&mut self, now: Instant) {
        let commands = self.machine.press(now);
        self.execute(commands, now);
    }

    pub fn release(&mut self, now: Instant) {
        let commands = self.machine.release(now);
        self.execute(commands, now);
    }

    fn execute(&mut self, commands: Vec<Command>, now: Instant) {
        for command in commands {
            match command {
                Command::TakePhoto => self.take_photo(),
                Command::StartRecording => self.start_recording(now),
                Command::StopRecording(reason) => {
                    tracing::info!("Stopping recording ({:?})", reason);
                    self.stop_recording();
                }
                Command::Progress(progress) => {
                    self.progress = progress;
                    tracing::debug!("Recording progress {:.0}%", progress * 100.0);
                }
            }
        }
    }

    fn take_photo(&mut self) {
        tracing::info!("Flash");
        let still = compose_still(
            self.camera.current_frame(),
            &mut self.compositor,
            &mut self.texture,
        );
        match photo_artifact(&still, SystemTime::now()) {
            Ok(photo) => self.preview.show(photo),
            Err(e) => tracing::warn!("Photo capture failed: {}", e),
        }
    }

    fn start_recording(&mut self, now: Instant) {
        let started = if self.recorder.is_some() {
            Err(CaptureError::AlreadyRecording)
        } else {
            CompositeRecorder::start(
                self.compositor.surface_size(),
                self.encoders.as_ref(),
                &self.recording,
                now,
            )
        };
        match started {
            Ok(recorder) => {
                let (w, h) = recorder.raster_size();
                tracing::debug!("Recorder raster {}x{} ({})", w, h, recorder.mime_type());
                self.recorder = Some(recorder);
            }
            // the live recording keeps its sink
            Err(CaptureError::AlreadyRecording) => {
                tracing::warn!("{}", CaptureError::AlreadyRecording)
            }
            Err(e) => {
                tracing::warn!("Recording could not start: {}", e);
                self.machine.abort();
                self.progress = 0.0;
            }
        }
    }

    fn stop_recording(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            self.pending = Some(recorder.stop());
        }
    }

    /// Apply a runtime control command
    pub fn handle(&mut self, command: ControlCommand, now: Instant) -> Flow {
        match command {
            ControlCommand::Press => self.press(now),
            ControlCommand::Release => self.release(now),
            ControlCommand::Shoot => {
                self.press(now);
                self.release(now);
            }
            ControlCommand::Tap => {
                if self.taps.tap(now) {
                    self.compositor.toggle_debug();
                }
            }
            ControlCommand::Key { color } => self.compositor.update_keying(&KeyColorUpdate {
                key_color: Some(color),
                ..Default::default()
            }),
            ControlCommand::Similarity { value } => {
                self.compositor.update_keying(&KeyColorUpdate {
                    similarity: Some(value),
                    ..Default::default()
                })
            }
            ControlCommand::Smoothness { value } => {
                self.compositor.update_keying(&KeyColorUpdate {
                    smoothness: Some(value),
                    ..Default::default()
                })
            }
            ControlCommand::Offset { value } => self.compositor.set_offset(value),
            ControlCommand::Resize { width, height } => self.compositor.resize((width, height)),
            ControlCommand::Overlay { path } => {
                tracing::info!("Loading overlay {}", path.display());
                self.begin_overlay_swap(OverlayLoad::spawn(&path, self.overlay_timeout, now));
            }
            ControlCommand::Play => self.texture.play(now),
            ControlCommand::Pause => self.texture.pause(now),
            ControlCommand::Retry => tracing::debug!("Already initialized, retry ignored"),
            ControlCommand::Share => {
                match self
                    .preview
                    .share(self.sharer.as_mut(), self.downloader.as_mut())
                {
                    Ok(outcome) => tracing::debug!("Share outcome: {:?}", outcome),
                    Err(e) => tracing::warn!("Share failed: {:#}", e),
                }
            }
            ControlCommand::Download => {
                if let Err(e) = self.preview.download(self.downloader.as_mut()) {
                    tracing::warn!("Download failed: {:#}", e);
                }
            }
            ControlCommand::Discard => self.preview.discard(),
            ControlCommand::Quit => {
                self.stop_recording();
                return Flow::Quit;
            }
        }
        Flow::Continue
    }

    /// Camera plus the last rendered overlay, for live preview output
    pub fn preview_frame(&self, size: (u32, u32)) -> RgbaImage {
        let mut raster = RgbaImage::new(size.0, size.1);
        if let Some(frame) = self.camera.current_frame() {
            draw_cover(&mut raster, frame);
        }
        if let Ok(surface) = self.compositor.read_back() {
            draw_stretched(&mut raster, surface);
        }
        raster
    }

    /// Flush a recording still in flight, e.g. at shutdown
    pub fn finish(&mut self) {
        self.stop_recording();
        self.finalize_pending();
    }
}
