use crate::recording::CapturedArtifact;
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ShareError {
    /// The user dismissed the share target; not a failure
    #[error("share cancelled")]
    Cancelled,
    #[error("share failed: {0}")]
    Failed(String),
}

/// Platform share target
pub trait Share {
    fn can_share(&self, artifact: &CapturedArtifact) -> bool;
    fn share(&mut self, artifact: &CapturedArtifact) -> Result<(), ShareError>;
}

/// Direct download of an artifact
pub trait Download {
    fn download(&mut self, artifact: &CapturedArtifact) -> Result<PathBuf>;
}

/// No share target available; every share falls back to download
pub struct NoShare;

impl Share for NoShare {
    fn can_share(&self, _artifact: &CapturedArtifact) -> bool {
        false
    }

    fn share(&mut self, _artifact: &CapturedArtifact) -> Result<(), ShareError> {
        Err(ShareError::Failed("sharing is not available".to_string()))
    }
}

/// Saves artifacts under a directory using their suggested filename
pub struct DirectoryDownload {
    dir: PathBuf,
}

impl DirectoryDownload {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl Download for DirectoryDownload {
    fn download(&mut self, artifact: &CapturedArtifact) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.dir.join(artifact.filename());
        fs::write(&path, artifact.payload())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(
            "Saved {} ({} bytes, {})",
            path.display(),
            artifact.payload().len(),
            artifact.mime_type()
        );
        Ok(path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    Shared,
    Downloaded(PathBuf),
    /// Share dismissed; the artifact stays in the preview
    Cancelled,
}

/// Holds the most recent artifact until it is shared, saved or discarded
#[derive(Default)]
pub struct Preview {
    current: Option<CapturedArtifact>,
}

impl Preview {
    pub fn show(&mut self, artifact: CapturedArtifact) {
        tracing::info!(
            "Showing preview for {}: {} ({} bytes)",
            artifact.mime_type(),
            artifact.filename(),
            artifact.payload().len()
        );
        self.current = Some(artifact);
    }

    pub fn current(&self) -> Option<&CapturedArtifact> {
        self.current.as_ref()
    }

    pub fn discard(&mut self) {
        self.current = None;
    }

    /// Share if possible, otherwise download
    ///
    /// A cancelled share never falls through to a download.
    pub fn share(
        &mut self,
        sharer: &mut dyn Share,
        downloader: &mut dyn Download,
    ) -> Result<Option<DeliveryOutcome>> {
        let Some(artifact) = self.current.as_ref() else {
            return Ok(None);
        };

        if sharer.can_share(artifact) {
            match sharer.share(artifact) {
                Ok(()) => {
                    self.current = None;
                    return Ok(Some(DeliveryOutcome::Shared));
                }
                Err(ShareError::Cancelled) => {
                    tracing::info!("Share cancelled, staying in preview");
                    return Ok(Some(DeliveryOutcome::Cancelled));
                }
                Err(e) => tracing::warn!("{}, falling back to download", e),
            }
        }

        self.download(downloader)
    }

    pub fn download(&mut self, downloader: &mut dyn Download) -> Result<Option<DeliveryOutcome>> {
        let Some(artifact) = self.current.as_ref() else {
            return Ok(None);
        };
        let path = downloader.download(artifact)?;
        self.current = None;
        Ok(Some(DeliveryOutcome::Downloaded(path)))
    }
}
