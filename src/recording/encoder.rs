use super::types::CaptureError;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Duration;

/// Container/codec candidates, most preferred first
pub const MIME_CANDIDATES: &[&str] = &[
    "video/mp4;codecs=avc1.42E01E",
    "video/mp4;codecs=avc1.420014",
    "video/mp4",
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8",
    "video/webm",
    "image/gif",
];

/// Used when no candidate reports support
pub const FALLBACK_MIME: &str = "image/gif";

/// Settings handed to an encoder when a recording starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bits_per_second: u32,
}

/// Consumes composited frames and produces encoded bytes incrementally
pub trait EncodingSink {
    fn mime_type(&self) -> &str;

    fn push_frame(&mut self, frame: &RgbaImage, timestamp: Duration) -> Result<(), CaptureError>;

    /// Drain whatever encoded data is buffered so far
    fn take_data(&mut self) -> Vec<u8>;

    /// Finish the stream; remaining data becomes available via `take_data`
    fn stop(&mut self) -> Result<(), CaptureError>;

    fn is_active(&self) -> bool;
}

/// Platform encoder service
pub trait EncoderFactory {
    fn is_type_supported(&self, mime: &str) -> bool;

    fn create(
        &self,
        mime: &str,
        settings: &EncoderSettings,
    ) -> Result<Box<dyn EncodingSink>, CaptureError>;
}

/// First candidate the factory supports, else [`FALLBACK_MIME`]
pub fn pick_supported_mime(candidates: &[&str], factory: &dyn EncoderFactory) -> String {
    candidates
        .iter()
        .find(|mime| factory.is_type_supported(mime))
        .map(|mime| mime.to_string())
        .unwrap_or_else(|| FALLBACK_MIME.to_string())
}

#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Built-in encoder producing looping animated GIFs
pub struct GifEncoderFactory;

impl EncoderFactory for GifEncoderFactory {
    fn is_type_supported(&self, mime: &str) -> bool {
        mime == "image/gif"
    }

    fn create(
        &self,
        mime: &str,
        settings: &EncoderSettings,
    ) -> Result<Box<dyn EncodingSink>, CaptureError> {
        if !self.is_type_supported(mime) {
            return Err(CaptureError::NoSupportedCodec);
        }
        Ok(Box::new(GifSink::new(settings)?))
    }
}

pub struct GifSink {
    encoder: Option<GifEncoder<SharedBuffer>>,
    buffer: SharedBuffer,
    frame_delay: Delay,
    frames: u64,
}

impl GifSink {
    fn new(settings: &EncoderSettings) -> Result<Self, CaptureError> {
        let buffer = SharedBuffer::default();
        // fastest quantizer; frames arrive on a fixed cadence
        let mut encoder = GifEncoder::new_with_speed(buffer.clone(), 30);
        encoder.set_repeat(Repeat::Infinite)?;
        let fps = settings.fps.max(1);
        // palette GIF has no rate control
        tracing::debug!(
            "GIF sink {}x{} @ {} fps, ignoring {} bit/s target",
            settings.width,
            settings.height,
            fps,
            settings.bits_per_second
        );
        Ok(Self {
            encoder: Some(encoder),
            buffer,
            frame_delay: Delay::from_numer_denom_ms(1000, fps),
            frames: 0,
        })
    }
}

impl EncodingSink for GifSink {
    fn mime_type(&self) -> &str {
        "image/gif"
    }

    fn push_frame(&mut self, frame: &RgbaImage, _timestamp: Duration) -> Result<(), CaptureError> {
        let Some(encoder) = self.encoder.as_mut() else {
            return Err(CaptureError::Encode("sink already stopped".to_string()));
        };
        encoder.encode_frame(Frame::from_parts(frame.clone(), 0, 0, self.frame_delay))?;
        self.frames += 1;
        Ok(())
    }

    fn take_data(&mut self) -> Vec<u8> {
        std::mem::take(&mut *self.buffer.0.borrow_mut())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        // dropping the encoder writes the GIF trailer into the buffer
        if self.encoder.take().is_some() {
            tracing::debug!("GIF sink stopped after {} frame(s)", self.frames);
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.encoder.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    struct Supports(&'static [&'static str]);

    impl EncoderFactory for Supports {
        fn is_type_supported(&self, mime: &str) -> bool {
            self.0.contains(&mime)
        }

        fn create(
            &self,
            _mime: &str,
            _settings: &EncoderSettings,
        ) -> Result<Box<dyn EncodingSink>, CaptureError> {
            Err(CaptureError::NoSupportedCodec)
        }
    }

    #[test]
    fn test_pick_prefers_earlier_candidates() {
        let factory = Supports(&["video/webm", "video/mp4"]);
        assert_eq!(pick_supported_mime(MIME_CANDIDATES, &factory), "video/mp4");

        let factory = Supports(&["video/webm;codecs=vp8", "video/webm"]);
        assert_eq!(
            pick_supported_mime(MIME_CANDIDATES, &factory),
            "video/webm;codecs=vp8"
        );
    }

    #[test]
    fn test_pick_falls_back_when_nothing_supported() {
        let factory = Supports(&[]);
        assert_eq!(pick_supported_mime(MIME_CANDIDATES, &factory), FALLBACK_MIME);
        assert_eq!(pick_supported_mime(MIME_CANDIDATES, &GifEncoderFactory), "image/gif");
    }

    #[test]
    fn test_gif_sink_produces_gif() {
        let settings = EncoderSettings {
            width: 8,
            height: 8,
            fps: 20,
            bits_per_second: 3_000_000,
        };
        let mut sink = GifEncoderFactory.create("image/gif", &settings).unwrap();
        let frame = RgbaImage::from_pixel(8, 8, Rgba([200, 10, 10, 255]));
        sink.push_frame(&frame, Duration::ZERO).unwrap();
        sink.push_frame(&frame, Duration::from_millis(50)).unwrap();

        let mut data = sink.take_data();
        assert!(data.starts_with(b"GIF89a"));
        assert!(sink.is_active());

        sink.stop().unwrap();
        assert!(!sink.is_active());
        data.extend(sink.take_data());
        assert_eq!(data.last(), Some(&0x3B));
        assert!(sink.push_frame(&frame, Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_gif_factory_rejects_other_types() {
        let settings = EncoderSettings {
            width: 8,
            height: 8,
            fps: 20,
            bits_per_second: 0,
        };
        assert!(matches!(
            GifEncoderFactory.create("video/mp4", &settings),
            Err(CaptureError::NoSupportedCodec)
        ));
    }
}
