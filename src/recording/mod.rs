mod cover;
mod encoder;
mod engine;
mod state;
mod timers;
pub mod types;

pub use cover::{draw_cover, draw_stretched};
pub use encoder::{EncoderFactory, GifEncoderFactory};
pub use engine::{compose_still, photo_artifact, CompositeRecorder, PendingVideo, RecordingConfig};
pub use state::{Command, Mode, RecordingStateMachine};
pub use types::CapturedArtifact;

#[cfg(test)]
pub use engine::tests as testing;
