//! Process exit codes and the error type command handlers return.

use std::process::ExitCode;

use thiserror::Error;

use clawgate_config::ConfigError;
use clawgate_crontab::CrontabError;
use clawgate_executor::{ExecutorError, Outcome};
use clawgate_jobs::{JobStoreError, LockError};
use clawgate_schedule::ScheduleError;

/// Stable exit codes. Cron wrappers branch on these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum ErrorCode {
    Success = 0,
    GeneralError = 1,
    JobNotFound = 2,
    JobDisabled = 3,
    AlreadyRunning = 4,
    ValidationError = 5,
    ConfigError = 6,
    ConnectionFailed = 7,
    ExecutionFailed = 8,
    Timeout = 9,
    LockConflict = 10,
}

impl ErrorCode {
    pub(crate) fn for_outcome(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Success | Outcome::DryRun => ErrorCode::Success,
            Outcome::Disabled => ErrorCode::JobDisabled,
            Outcome::AlreadyRunning { .. } => ErrorCode::AlreadyRunning,
            Outcome::PayloadError(_) => ErrorCode::ValidationError,
            Outcome::SpawnFailed(_) => ErrorCode::ConnectionFailed,
            Outcome::Failed { .. } => ErrorCode::ExecutionFailed,
            Outcome::TimedOut => ErrorCode::Timeout,
        }
    }
}

impl From<ErrorCode> for ExitCode {
    fn from(code: ErrorCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// A failed command: message for stderr plus the exit code.
#[derive(Debug, Error)]
#[error("{message}")]
pub(crate) struct CliError {
    pub code: ErrorCode,
    pub message: String,
}

impl CliError {
    pub(crate) fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn not_found(job_id: &str) -> Self {
        Self::new(ErrorCode::JobNotFound, format!("Job not found: {job_id}"))
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }
}

pub(crate) type CliResult<T = ErrorCode> = Result<T, CliError>;

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::new(ErrorCode::ConfigError, e.to_string())
    }
}

impl From<ScheduleError> for CliError {
    fn from(e: ScheduleError) -> Self {
        Self::validation(e.to_string())
    }
}

impl From<JobStoreError> for CliError {
    fn from(e: JobStoreError) -> Self {
        let code = match e {
            JobStoreError::Validation(_) => ErrorCode::ValidationError,
            _ => ErrorCode::GeneralError,
        };
        Self::new(code, e.to_string())
    }
}

impl From<LockError> for CliError {
    fn from(e: LockError) -> Self {
        Self::new(ErrorCode::LockConflict, e.to_string())
    }
}

impl From<CrontabError> for CliError {
    fn from(e: CrontabError) -> Self {
        let code = match e {
            CrontabError::InvalidEntry(_) => ErrorCode::ValidationError,
            _ => ErrorCode::GeneralError,
        };
        Self::new(code, format!("Crontab update failed: {e}"))
    }
}

impl From<ExecutorError> for CliError {
    fn from(e: ExecutorError) -> Self {
        match e {
            ExecutorError::JobNotFound(id) => Self::not_found(&id),
            ExecutorError::Store(e) => e.into(),
            ExecutorError::Lock(e) => e.into(),
            ExecutorError::Crontab(e) => e.into(),
            e @ ExecutorError::Delivery(_) => Self::new(ErrorCode::ConfigError, e.to_string()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorCode::GeneralError, e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorCode::GeneralError, e.to_string())
    }
}
