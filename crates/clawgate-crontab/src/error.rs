//! Crontab errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrontabError {
    /// The `crontab` program failed or could not be started.
    #[error("crontab command failed: {0}")]
    Command(String),

    /// The crontab file could not be read or written.
    #[error("Crontab file error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The managed region is opened but never closed, or closed twice.
    #[error("Malformed managed region: {0}")]
    MalformedRegion(String),

    /// An entry cannot be written safely.
    #[error("Invalid crontab entry: {0}")]
    InvalidEntry(String),
}

impl CrontabError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
