//! # ClawGate Config
//!
//! Configuration management for ClawGate: where state lives, how the
//! delivery binary is invoked, job defaults, reply routing and the crontab
//! backend.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{
    ConfigValidator, MIN_TIMEOUT_MS, ValidationError, ValidationResult, ValidationWarning,
};
