//! Schedule compilation errors.

use thiserror::Error;

/// Errors produced while compiling a schedule expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("Schedule expression is empty")]
    Empty,

    #[error("Could not understand schedule '{input}'")]
    Unrecognized { input: String },

    #[error("Invalid time '{token}' in schedule '{input}'")]
    InvalidTime { input: String, token: String },

    #[error("Unknown day '{token}' in schedule '{input}'")]
    InvalidDay { input: String, token: String },

    #[error("Unknown month '{token}' in schedule '{input}'")]
    InvalidMonth { input: String, token: String },

    #[error("Invalid value '{token}' in schedule '{input}': {reason}")]
    InvalidValue {
        input: String,
        token: String,
        reason: String,
    },

    #[error("Time '{token}' in schedule '{input}' has already passed today")]
    TimeInPast { input: String, token: String },

    #[error("Invalid cron expression '{input}': {reason}")]
    InvalidCron { input: String, reason: String },

    #[error("Unknown timezone '{0}'")]
    UnknownTimezone(String),
}

impl ScheduleError {
    pub(crate) fn invalid_value(
        input: &str,
        token: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            input: input.to_string(),
            token: token.into(),
            reason: reason.into(),
        }
    }
}
