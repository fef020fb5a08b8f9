//! Configuration loading and the shared handles every command needs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use clawgate_config::{
    Config, ConfigLoader, ConfigValidator, CrontabBackendKind, default_state_dir,
};
use clawgate_crontab::{CrontabBackend, CrontabSync, FileCrontab, SystemCrontab};
use clawgate_executor::Executor;
use clawgate_jobs::{FileJobStore, JobDefaults, JobStore};

use crate::exit::{CliError, CliResult, ErrorCode};

/// Resolve and validate configuration.
///
/// `--config` must exist when given; the default `<home>/config.toml` may be
/// absent. `--home` wins over `paths.state_dir` from the file.
pub(crate) fn load_config(home: Option<&Path>, config: Option<&Path>) -> CliResult<Config> {
    let state_dir = home.map(Path::to_path_buf).unwrap_or_else(default_state_dir);

    let mut loaded = match config {
        Some(path) => ConfigLoader::load(path)?,
        None => {
            let path = state_dir.join("config.toml");
            let loaded = ConfigLoader::load_or_default(&path)?;
            if path.exists() {
                loaded
            } else {
                loaded.with_state_dir(&state_dir)
            }
        }
    };
    if let Some(home) = home {
        loaded = loaded.with_state_dir(home);
    }
    loaded.apply_overrides(|key| std::env::var(key).ok());

    for warning in ConfigValidator::validate(&loaded).into_result()? {
        warn!("Config: {}: {}", warning.path, warning.message);
    }

    Ok(loaded)
}

/// Store, crontab and executor wired from one [`Config`].
pub(crate) struct AppContext {
    pub config: Config,
    pub store: Arc<FileJobStore>,
    pub crontab: Arc<CrontabSync>,
}

impl AppContext {
    pub(crate) async fn new(config: Config) -> CliResult<Self> {
        let defaults = JobDefaults {
            timezone: config.defaults.timezone.clone(),
            timeout_ms: config.defaults.timeout_ms,
            max_retries: config.defaults.max_retries,
            retry_delay_ms: config.defaults.retry_delay_ms,
        };
        let store = Arc::new(FileJobStore::new(config.paths.jobs_dir(), defaults).await?);
        let crontab = Arc::new(build_crontab(&config)?);

        Ok(Self {
            config,
            store,
            crontab,
        })
    }

    pub(crate) fn executor(&self) -> Executor {
        let store: Arc<dyn JobStore> = self.store.clone();
        Executor::new(&self.config, store).with_crontab(self.crontab.clone())
    }
}

fn build_crontab(config: &Config) -> CliResult<CrontabSync> {
    let backend: Box<dyn CrontabBackend> = match config.crontab.backend {
        CrontabBackendKind::System => Box::new(SystemCrontab::new()),
        CrontabBackendKind::File => {
            let path = config.crontab.file.clone().ok_or_else(|| {
                CliError::new(
                    ErrorCode::ConfigError,
                    "crontab.file is required for the file backend",
                )
            })?;
            Box::new(FileCrontab::new(path))
        }
    };

    let command = match &config.crontab.command {
        Some(command) => command.clone(),
        None => current_exe()?,
    };
    debug!("Crontab backend: {}, command: {:?}", backend.describe(), command);

    Ok(CrontabSync::new(backend, command.to_string_lossy().into_owned())
        .with_log_file(config.crontab.log_file.clone()))
}

fn current_exe() -> CliResult<PathBuf> {
    std::env::current_exe().map_err(|e| {
        CliError::new(
            ErrorCode::ConfigError,
            format!("Cannot determine the clawgate binary path (set crontab.command): {e}"),
        )
    })
}
