//! Executor errors.

use std::path::PathBuf;
use thiserror::Error;

use clawgate_crontab::CrontabError;
use clawgate_jobs::{JobStoreError, LockError};

/// Failures that stop an execution before it can be classified.
///
/// Expected outcomes (disabled, already running, non-zero exit, timeout) are
/// reported through [`crate::Outcome`] instead.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error(transparent)]
    Store(#[from] JobStoreError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Crontab(#[from] CrontabError),

    /// The configured delivery command is unusable.
    #[error("Invalid delivery configuration: {0}")]
    Delivery(String),
}

/// Payload resolution failures.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Payload file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read payload file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Payload resolved to an empty message")]
    Empty,
}
