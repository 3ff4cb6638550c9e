use nokhwa::NokhwaError;
use thiserror::Error;

/// Classified camera acquisition failure
///
/// Each variant maps to its own user-facing message so a front end can offer
/// a targeted retry hint.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CameraError {
    #[error("camera access denied")]
    PermissionDenied,
    #[error("no camera found")]
    DeviceNotFound,
    #[error("camera access requires a secure context")]
    InsecureContext,
    #[error("camera capture is not supported on this platform")]
    UnsupportedApi,
    #[error("camera error: {0}")]
    Other(String),
}

impl CameraError {
    pub fn user_message(&self) -> String {
        match self {
            Self::PermissionDenied => {
                "Camera access denied. Please allow camera permissions and retry.".to_string()
            }
            Self::DeviceNotFound => {
                "No camera found. Please connect a camera and retry.".to_string()
            }
            Self::InsecureContext => {
                "Camera requires a secure context. Please restart from a trusted session."
                    .to_string()
            }
            Self::UnsupportedApi => {
                "Camera capture is not supported here. Please check platform compatibility."
                    .to_string()
            }
            Self::Other(msg) => format!("Camera error: {}. Please retry.", msg),
        }
    }

    /// Map a backend error onto the classified taxonomy
    pub fn classify(err: &NokhwaError) -> Self {
        match err {
            NokhwaError::UnsupportedOperationError(_) | NokhwaError::NotImplementedError(_) => {
                Self::UnsupportedApi
            }
            other => Self::classify_message(&other.to_string()),
        }
    }

    /// Backends only report most failures as text
    pub fn classify_message(msg: &str) -> Self {
        let lower = msg.to_lowercase();
        if lower.contains("insecure") || lower.contains("secure context") {
            Self::InsecureContext
        } else if lower.contains("permission")
            || lower.contains("denied")
            || lower.contains("eacces")
        {
            Self::PermissionDenied
        } else if lower.contains("no such")
            || lower.contains("not found")
            || lower.contains("no device")
            || lower.contains("enoent")
        {
            Self::DeviceNotFound
        } else if lower.contains("not supported") || lower.contains("unsupported") {
            Self::UnsupportedApi
        } else {
            Self::Other(msg.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_messages() {
        assert_eq!(
            CameraError::classify_message("Could not open device: Permission denied (os error 13)"),
            CameraError::PermissionDenied
        );
        assert_eq!(
            CameraError::classify_message("No such file or directory (os error 2)"),
            CameraError::DeviceNotFound
        );
        assert_eq!(
            CameraError::classify_message("backend not supported"),
            CameraError::UnsupportedApi
        );
        assert_eq!(
            CameraError::classify_message("camera blocked on insecure origin"),
            CameraError::InsecureContext
        );
        assert_eq!(
            CameraError::classify_message("access denied: requires a secure context"),
            CameraError::InsecureContext
        );
        assert!(matches!(
            CameraError::classify_message("stream hiccup"),
            CameraError::Other(_)
        ));
    }

    #[test]
    fn test_user_messages_are_distinct() {
        let kinds = [
            CameraError::PermissionDenied,
            CameraError::DeviceNotFound,
            CameraError::InsecureContext,
            CameraError::UnsupportedApi,
            CameraError::Other("x".to_string()),
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in kinds.iter().skip(i + 1) {
                assert_ne!(a.user_message(), b.user_message());
            }
        }
    }
}
