//! Configuration validation.

use std::str::FromStr;

use chrono_tz::Tz;

use crate::error::ConfigError;
use crate::schema::{Config, CrontabBackendKind};

/// Smallest per-job timeout accepted anywhere in ClawGate.
pub const MIN_TIMEOUT_MS: u64 = 1_000;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Warnings if valid, otherwise [`ConfigError::Invalid`] with every error.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(ConfigError::Invalid(
                self.errors.iter().map(ToString::to_string).collect(),
            ))
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_delivery(config, &mut result);
        Self::validate_defaults(config, &mut result);
        Self::validate_crontab(config, &mut result);

        result
    }

    fn validate_delivery(config: &Config, result: &mut ValidationResult) {
        match config.delivery.command.first() {
            None => result.add_error(ValidationError::new(
                "delivery.command",
                "Delivery command cannot be empty",
            )),
            Some(program) if program.trim().is_empty() => result.add_error(
                ValidationError::new("delivery.command", "Delivery program cannot be blank"),
            ),
            Some(_) => {}
        }

        if config.delivery.grace_period_ms > 3_600_000 {
            result.add_warning(ValidationWarning::new(
                "delivery.grace_period_ms",
                "grace period is over an hour, stuck deliveries will hold their lock that long",
            ));
        }
    }

    fn validate_defaults(config: &Config, result: &mut ValidationResult) {
        if config.defaults.timeout_ms < MIN_TIMEOUT_MS {
            result.add_error(ValidationError::new(
                "defaults.timeout_ms",
                format!("timeout_ms must be at least {}", MIN_TIMEOUT_MS),
            ));
        }

        if Tz::from_str(&config.defaults.timezone).is_err() {
            result.add_error(ValidationError::new(
                "defaults.timezone",
                format!("Unknown timezone '{}'", config.defaults.timezone),
            ));
        }

        if config.defaults.agent.trim().is_empty() {
            result.add_error(ValidationError::new(
                "defaults.agent",
                "Default agent cannot be empty",
            ));
        }
    }

    fn validate_crontab(config: &Config, result: &mut ValidationResult) {
        if config.crontab.backend == CrontabBackendKind::File && config.crontab.file.is_none() {
            result.add_error(ValidationError::new(
                "crontab.file",
                "The file backend requires crontab.file",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
