//! Job store and lock errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a [`crate::JobStore`].
#[derive(Debug, Error)]
pub enum JobStoreError {
    /// A job failed validation before being persisted.
    #[error("Invalid job: {0}")]
    Validation(String),

    /// A record on disk could not be decoded even leniently.
    #[error("Job record '{id}' is unreadable: {reason}")]
    Corrupt { id: String, reason: String },

    /// Storage I/O failed.
    #[error("Job storage error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding failed.
    #[error("Failed to serialize job: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl JobStoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised by an [`crate::ExecutionLock`].
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock marker could not be created, read or removed.
    #[error("Lock file error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The lock marker could not be encoded.
    #[error("Failed to encode lock marker: {0}")]
    Encode(#[from] serde_json::Error),
}

impl LockError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = JobStoreError::Validation("name must not be empty".into());
        assert_eq!(err.to_string(), "Invalid job: name must not be empty");

        let err = JobStoreError::Corrupt {
            id: "job-1".into(),
            reason: "not an object".into(),
        };
        assert!(err.to_string().contains("job-1"));
    }

    #[test]
    fn test_io_error_keeps_path() {
        let err = LockError::io(
            "/tmp/locks/job-1.lock",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/locks/job-1.lock"));
    }
}
