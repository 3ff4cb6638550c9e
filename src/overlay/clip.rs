use crate::capture::FrameSource;
use anyhow::Result;
use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::{AnimationDecoder, Frame, RgbaImage};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OverlayLoadError {
    #[error("overlay did not become ready within {0:?}")]
    Timeout(Duration),
    #[error("failed to open overlay {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to decode overlay: {0}")]
    Decode(String),
}

impl From<image::ImageError> for OverlayLoadError {
    fn from(e: image::ImageError) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Looping overlay clip decoded fully into memory
pub struct OverlayClip {
    frames: Vec<(RgbaImage, Duration)>,
    total: Duration,
    looping: bool,
    started_at: Option<Instant>,
    paused_at: Option<Duration>,
    index: usize,
    ended: bool,
}

impl OverlayClip {
    pub fn new(frames: Vec<(RgbaImage, Duration)>, looping: bool) -> Self {
        let total = frames.iter().map(|(_, delay)| *delay).sum();
        Self {
            frames,
            total,
            looping,
            started_at: None,
            paused_at: None,
            index: 0,
            ended: false,
        }
    }

    /// Single still image shown forever
    pub fn still(image: RgbaImage) -> Self {
        Self::new(vec![(image, Duration::ZERO)], true)
    }

    /// Decode an animated GIF/APNG, or any still image `image` understands
    pub fn open(path: &Path) -> Result<Self, OverlayLoadError> {
        let _span = tracing::debug_span!("overlay_decode").entered();
        let io_err = |source| OverlayLoadError::Io {
            path: path.to_path_buf(),
            source,
        };
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let frames = match extension.as_deref() {
            Some("gif") => {
                let reader = BufReader::new(File::open(path).map_err(io_err)?);
                collect(GifDecoder::new(reader)?.into_frames().collect_frames()?)
            }
            Some("png") | Some("apng") => {
                let reader = BufReader::new(File::open(path).map_err(io_err)?);
                let decoder = PngDecoder::new(reader)?;
                if decoder.is_apng()? {
                    collect(decoder.apng()?.into_frames().collect_frames()?)
                } else {
                    vec![(
                        image::DynamicImage::from_decoder(decoder)?.to_rgba8(),
                        Duration::ZERO,
                    )]
                }
            }
            _ => vec![(image::open(path)?.to_rgba8(), Duration::ZERO)],
        };

        if frames.is_empty() {
            return Err(OverlayLoadError::Decode("overlay has no frames".to_string()));
        }

        tracing::info!(
            "Overlay decoded: {} frame(s), {}x{}",
            frames.len(),
            frames[0].0.width(),
            frames[0].0.height()
        );
        Ok(Self::new(frames, true))
    }

    pub fn play(&mut self, now: Instant) {
        let offset = self.paused_at.take().unwrap_or(Duration::ZERO);
        self.started_at = Some(now - offset);
        self.ended = false;
    }

    pub fn pause(&mut self, now: Instant) {
        if let Some(start) = self.started_at.take() {
            self.paused_at = Some(now.saturating_duration_since(start));
        }
    }

    pub fn duration(&self) -> Duration {
        self.total
    }

    fn frame_at(&self, position: Duration) -> usize {
        let mut acc = Duration::ZERO;
        for (i, (_, delay)) in self.frames.iter().enumerate() {
            acc += *delay;
            if position < acc {
                return i;
            }
        }
        self.frames.len().saturating_sub(1)
    }
}

fn collect(frames: Vec<Frame>) -> Vec<(RgbaImage, Duration)> {
    frames
        .into_iter()
        .map(|frame| {
            let (numer, denom) = frame.delay().numer_denom_ms();
            let ms = if denom == 0 { 0 } else { numer / denom };
            (frame.into_buffer(), Duration::from_millis(ms as u64))
        })
        .collect()
}

impl FrameSource for OverlayClip {
    fn poll(&mut self, now: Instant) -> Result<()> {
        let Some(start) = self.started_at else {
            return Ok(());
        };
        // zero-length clips hold their first frame
        if self.total.is_zero() {
            return Ok(());
        }

        let elapsed = now.saturating_duration_since(start);
        if self.looping {
            let position = Duration::from_nanos(
                (elapsed.as_nanos() % self.total.as_nanos()) as u64,
            );
            self.index = self.frame_at(position);
        } else if elapsed >= self.total {
            self.index = self.frames.len() - 1;
            self.ended = true;
            self.started_at = None;
        } else {
            self.index = self.frame_at(elapsed);
        }
        Ok(())
    }

    fn current_frame(&self) -> Option<&RgbaImage> {
        self.frames.get(self.index).map(|(image, _)| image)
    }

    fn resolution(&self) -> (u32, u32) {
        self.current_frame()
            .map(|frame| frame.dimensions())
            .unwrap_or((0, 0))
    }

    fn is_playing(&self) -> bool {
        self.started_at.is_some() && !self.ended
    }
}

type LoadResult = Result<OverlayClip, OverlayLoadError>;

/// An overlay decode running on a helper thread, bounded by a deadline
///
/// A timed-out decode keeps running on its thread; its result is dropped.
pub struct OverlayLoad {
    rx: mpsc::Receiver<LoadResult>,
    deadline: Instant,
    timeout: Duration,
}

impl OverlayLoad {
    pub fn spawn(path: &Path, timeout: Duration, now: Instant) -> Self {
        let owned = path.to_path_buf();
        Self::with_loader(move || OverlayClip::open(&owned), timeout, now)
    }

    pub fn with_loader<F>(loader: F, timeout: Duration, now: Instant) -> Self
    where
        F: FnOnce() -> LoadResult + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(loader());
        });
        Self {
            rx,
            deadline: now + timeout,
            timeout,
        }
    }

    /// Non-blocking check; `None` while the decode is still within its deadline
    pub fn poll(&self, now: Instant) -> Option<LoadResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) if now < self.deadline => None,
            Err(mpsc::TryRecvError::Empty) => Some(Err(OverlayLoadError::Timeout(self.timeout))),
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(loader_exited())),
        }
    }

    /// Block until the decode finishes or the deadline passes
    pub fn wait(self) -> LoadResult {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        match self.rx.recv_timeout(remaining) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(OverlayLoadError::Timeout(self.timeout)),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(loader_exited()),
        }
    }
}

fn loader_exited() -> OverlayLoadError {
    OverlayLoadError::Decode("overlay loader exited without a result".to_string())
}

/// Decode the overlay on a helper thread, giving up after `timeout`
pub fn load_with_timeout(path: &Path, timeout: Duration) -> LoadResult {
    OverlayLoad::spawn(path, timeout, Instant::now()).wait()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn frame(value: u8) -> RgbaImage {
        RgbaImage::from_pixel(4, 2, Rgba([value, 0, 0, 255]))
    }

    fn clip(looping: bool) -> OverlayClip {
        OverlayClip::new(
            vec![
                (frame(1), Duration::from_millis(100)),
                (frame(2), Duration::from_millis(100)),
            ],
            looping,
        )
    }

    #[test]
    fn test_looping_clip_wraps() {
        let t0 = Instant::now();
        let mut clip = clip(true);
        clip.play(t0);
        clip.poll(t0 + Duration::from_millis(150)).unwrap();
        assert_eq!(clip.current_frame().unwrap().get_pixel(0, 0)[0], 2);
        clip.poll(t0 + Duration::from_millis(250)).unwrap();
        assert_eq!(clip.current_frame().unwrap().get_pixel(0, 0)[0], 1);
        assert!(clip.is_playing());
    }

    #[test]
    fn test_one_shot_clip_ends() {
        let t0 = Instant::now();
        let mut clip = clip(false);
        clip.play(t0);
        clip.poll(t0 + Duration::from_millis(500)).unwrap();
        assert!(!clip.is_playing());
        assert_eq!(clip.current_frame().unwrap().get_pixel(0, 0)[0], 2);
    }

    #[test]
    fn test_pause_stops_playback() {
        let t0 = Instant::now();
        let mut clip = clip(true);
        clip.play(t0);
        clip.pause(t0 + Duration::from_millis(120));
        assert!(!clip.is_playing());
        clip.play(t0 + Duration::from_millis(1000));
        clip.poll(t0 + Duration::from_millis(1000)).unwrap();
        assert_eq!(clip.current_frame().unwrap().get_pixel(0, 0)[0], 2);
    }

    #[test]
    fn test_zero_duration_clip_is_tolerated() {
        let t0 = Instant::now();
        let mut clip = OverlayClip::new(vec![(frame(7), Duration::ZERO)], true);
        clip.play(t0);
        clip.poll(t0 + Duration::from_secs(3)).unwrap();
        assert_eq!(clip.resolution(), (4, 2));
        assert_eq!(clip.duration(), Duration::ZERO);

        let empty = OverlayClip::new(Vec::new(), true);
        assert_eq!(empty.resolution(), (0, 0));
        assert!(empty.current_frame().is_none());
    }

    #[test]
    fn test_missing_file_fails_fast() {
        let result = load_with_timeout(
            Path::new("/nonexistent/overlay.gif"),
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(OverlayLoadError::Io { .. })));
    }

    /// Loader that stays blocked until the returned sender is dropped
    fn stalled_load(timeout: Duration, now: Instant) -> (mpsc::Sender<()>, OverlayLoad) {
        let (release, gate) = mpsc::channel::<()>();
        let load = OverlayLoad::with_loader(
            move || {
                let _ = gate.recv();
                Err(OverlayLoadError::Decode("released".to_string()))
            },
            timeout,
            now,
        );
        (release, load)
    }

    #[test]
    fn test_stalled_load_times_out() {
        let (_release, load) = stalled_load(Duration::from_millis(20), Instant::now());
        assert!(matches!(
            load.wait(),
            Err(OverlayLoadError::Timeout(timeout)) if timeout == Duration::from_millis(20)
        ));
    }

    #[test]
    fn test_poll_never_blocks_before_deadline() {
        let t0 = Instant::now();
        let (_release, load) = stalled_load(Duration::from_secs(8), t0);
        assert!(load.poll(t0).is_none());
        assert!(load.poll(t0 + Duration::from_millis(7999)).is_none());
        assert!(matches!(
            load.poll(t0 + Duration::from_secs(8)),
            Some(Err(OverlayLoadError::Timeout(_)))
        ));
    }

    #[test]
    fn test_poll_delivers_finished_clip() {
        let t0 = Instant::now();
        let load = OverlayLoad::with_loader(
            || Ok(OverlayClip::still(frame(3))),
            Duration::from_secs(60),
            t0,
        );
        // the helper thread hands the result over through the channel
        let clip = load.wait().unwrap();
        assert_eq!(clip.resolution(), (4, 2));
    }
}
