use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Capture or encoding failure; the booth stays idle and can retry
#[derive(Debug, Error, PartialEq)]
pub enum CaptureError {
    #[error("no supported video codec")]
    NoSupportedCodec,
    #[error("recording produced no data")]
    EmptyRecording,
    #[error("encoding failed: {0}")]
    Encode(String),
    #[error("a recording is already in progress")]
    AlreadyRecording,
}

impl From<image::ImageError> for CaptureError {
    fn from(e: image::ImageError) -> Self {
        Self::Encode(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Photo,
    Video,
}

/// A finished photo or video, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedArtifact {
    kind: ArtifactKind,
    payload: Vec<u8>,
    mime_type: String,
    filename: String,
}

impl CapturedArtifact {
    pub fn photo(png: Vec<u8>, at: SystemTime) -> Self {
        Self {
            kind: ArtifactKind::Photo,
            payload: png,
            mime_type: "image/png".to_string(),
            filename: format!("photo_{}.png", unix_millis(at)),
        }
    }

    pub fn video(payload: Vec<u8>, mime_type: &str, at: SystemTime) -> Self {
        Self {
            kind: ArtifactKind::Video,
            payload,
            mime_type: mime_type.to_string(),
            filename: format!("video_{}.{}", unix_millis(at), extension_for_mime(mime_type)),
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

pub fn extension_for_mime(mime: &str) -> &'static str {
    if mime.contains("mp4") {
        "mp4"
    } else if mime.starts_with("image/gif") {
        "gif"
    } else {
        "webm"
    }
}

fn unix_millis(at: SystemTime) -> u128 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
