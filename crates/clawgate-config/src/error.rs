//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A `${VAR}` reference names an unset variable.
    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Validation failed; one message per problem.
    #[error("Invalid configuration:\n  {}", .0.join("\n  "))]
    Invalid(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_names_path() {
        let err = ConfigError::NotFound(PathBuf::from("/etc/clawgate.toml"));
        assert_eq!(err.to_string(), "Config file not found: /etc/clawgate.toml");
    }

    #[test]
    fn test_invalid_lists_every_problem() {
        let err = ConfigError::Invalid(vec![
            "defaults.timeout_ms: timeout_ms must be at least 1000".to_string(),
            "crontab.file: The file backend requires crontab.file".to_string(),
        ]);
        let display = err.to_string();
        assert!(display.contains("timeout_ms must be at least 1000"));
        assert!(display.contains("\n  crontab.file"));
    }

    #[test]
    fn test_read_error_keeps_source() {
        let err = ConfigError::Read {
            path: PathBuf::from("config.toml"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("config.toml"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
