//! Error taxonomy shared by the portal client, installer and mod store
//!
//! Plumbing code uses `anyhow`; the variants here are attached as root causes
//! so callers can recover the kind with [`ModError::find`] and decide whether
//! an operation is worth retrying.

use std::path::PathBuf;
use thiserror::Error;

/// Broad error category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Network,
    File,
    Validation,
    General,
}

#[derive(Debug, Error)]
pub enum ModError {
    #[error("mod portal credentials are missing (set portal.username and portal.token)")]
    MissingCredentials,

    #[error("mod portal rejected the credentials")]
    InvalidCredentials,

    #[error("network error: {0}")]
    Network(String),

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("API request to {url} failed with status {status}")]
    ApiRequestFailed { url: String, status: u16 },

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    #[error("file is corrupted: {0}")]
    Corrupted(String),

    #[error("access denied: {}", .0.display())]
    AccessDenied(PathBuf),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("missing dependencies: {}", .0.join(", "))]
    MissingDependencies(Vec<String>),

    #[error("invalid mod format: {0}")]
    InvalidModFormat(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl ModError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModError::MissingCredentials | ModError::InvalidCredentials => ErrorKind::Authentication,
            ModError::Network(_) | ModError::DownloadFailed(_) | ModError::ApiRequestFailed { .. } => {
                ErrorKind::Network
            }
            ModError::FileNotFound(_)
            | ModError::InvalidFormat(_)
            | ModError::Corrupted(_)
            | ModError::AccessDenied(_) => ErrorKind::File,
            ModError::InvalidInput(_)
            | ModError::MissingDependencies(_)
            | ModError::InvalidModFormat(_) => ErrorKind::Validation,
            ModError::Unexpected(_) | ModError::Cancelled => ErrorKind::General,
        }
    }

    /// Whether a caller may retry the failed operation
    pub fn is_transient(&self) -> bool {
        match self {
            ModError::ApiRequestFailed { status, .. } => *status == 429 || *status >= 500,
            ModError::Network(_) | ModError::DownloadFailed(_) | ModError::Cancelled => true,
            _ => false,
        }
    }

    /// Short status line suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Authentication => format!("Authentication problem: {}", self),
            ErrorKind::Network => format!("Network problem: {}", self),
            ErrorKind::File => format!("File problem: {}", self),
            ErrorKind::Validation => format!("Validation problem: {}", self),
            ErrorKind::General => match self {
                ModError::Cancelled => "Operation cancelled".to_string(),
                _ => format!("Error: {}", self),
            },
        }
    }

    /// Locate a `ModError` anywhere in an anyhow error chain
    pub fn find(err: &anyhow::Error) -> Option<&ModError> {
        err.chain().find_map(|cause| cause.downcast_ref::<ModError>())
    }

    /// Map an I/O error for `path` onto the file taxonomy
    pub fn from_io(err: &std::io::Error, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => ModError::FileNotFound(path),
            std::io::ErrorKind::PermissionDenied => ModError::AccessDenied(path),
            _ => ModError::Unexpected(format!("{}: {}", path.display(), err)),
        }
    }
}

/// Status string for any anyhow error, preferring the typed message when present
pub fn status_message(err: &anyhow::Error) -> String {
    match ModError::find(err) {
        Some(mod_err) => mod_err.user_message(),
        None => format!("Error: {:#}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_kinds() {
        assert_eq!(ModError::MissingCredentials.kind(), ErrorKind::Authentication);
        assert_eq!(ModError::DownloadFailed("x".into()).kind(), ErrorKind::Network);
        assert_eq!(ModError::Corrupted("x".into()).kind(), ErrorKind::File);
        assert_eq!(
            ModError::MissingDependencies(vec!["a".into()]).kind(),
            ErrorKind::Validation
        );
        assert_eq!(ModError::Cancelled.kind(), ErrorKind::General);
    }

    #[test]
    fn test_transient_classification() {
        assert!(ModError::Network("reset".into()).is_transient());
        assert!(ModError::ApiRequestFailed { url: "u".into(), status: 503 }.is_transient());
        assert!(ModError::ApiRequestFailed { url: "u".into(), status: 429 }.is_transient());
        assert!(!ModError::ApiRequestFailed { url: "u".into(), status: 404 }.is_transient());
        assert!(!ModError::InvalidCredentials.is_transient());
    }

    #[test]
    fn test_find_through_context() {
        let err: anyhow::Result<()> = Err(ModError::MissingCredentials.into());
        let err = err.context("Failed to download release").unwrap_err();
        let found = ModError::find(&err).expect("typed error should be found");
        assert!(matches!(found, ModError::MissingCredentials));
        assert!(status_message(&err).starts_with("Authentication problem"));
    }

    #[test]
    fn test_from_io() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(ModError::from_io(&err, "/tmp/x"), ModError::FileNotFound(_)));
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        assert!(matches!(ModError::from_io(&err, "/tmp/x"), ModError::AccessDenied(_)));
    }
}
