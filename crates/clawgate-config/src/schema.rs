//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::loader::ConfigLoader;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub crontab: CrontabConfig,
}

impl Config {
    /// Point every derived directory at a new state root.
    pub fn with_state_dir(mut self, state_dir: impl Into<PathBuf>) -> Self {
        self.paths.state_dir = state_dir.into();
        self
    }

    /// Apply `CLAWGATE_*` overrides using the given variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bin) = lookup("CLAWGATE_DELIVERY_BIN") {
            self.delivery.command = vec![bin];
        }
        if let Some(url) = lookup("CLAWGATE_GATEWAY_URL") {
            self.delivery.gateway_url = Some(url);
        }
        if let Some(token) = lookup("CLAWGATE_GATEWAY_TOKEN") {
            self.delivery.gateway_token = Some(token);
        }
        if let Some(tz) = lookup("CLAWGATE_TIMEZONE") {
            self.defaults.timezone = tz;
        }
    }

    /// Expand `~` in every configured path.
    pub(crate) fn expand_paths(&mut self) {
        fn expand(path: &Path) -> PathBuf {
            PathBuf::from(ConfigLoader::expand_path(&path.to_string_lossy()))
        }

        self.paths.state_dir = expand(&self.paths.state_dir);
        for dir in [
            &mut self.paths.jobs_dir,
            &mut self.paths.locks_dir,
            &mut self.paths.logs_dir,
            &mut self.paths.templates_dir,
            &mut self.crontab.file,
            &mut self.crontab.command,
            &mut self.crontab.log_file,
        ] {
            if let Some(path) = dir.as_mut() {
                *path = expand(path);
            }
        }
    }
}

/// Filesystem layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of all ClawGate state.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default)]
    pub jobs_dir: Option<PathBuf>,

    #[serde(default)]
    pub locks_dir: Option<PathBuf>,

    #[serde(default)]
    pub logs_dir: Option<PathBuf>,

    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            jobs_dir: None,
            locks_dir: None,
            logs_dir: None,
            templates_dir: None,
        }
    }
}

impl PathsConfig {
    pub fn jobs_dir(&self) -> PathBuf {
        self.resolve(&self.jobs_dir, "jobs")
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.resolve(&self.locks_dir, "locks")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.resolve(&self.logs_dir, "logs")
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.resolve(&self.templates_dir, "templates")
    }

    pub fn config_file(&self) -> PathBuf {
        self.state_dir.join("config.toml")
    }

    fn resolve(&self, explicit: &Option<PathBuf>, name: &str) -> PathBuf {
        explicit
            .clone()
            .unwrap_or_else(|| self.state_dir.join(name))
    }
}

/// Default state directory (`~/.clawgate`).
pub fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".clawgate"))
        .unwrap_or_else(|| PathBuf::from(".clawgate"))
}

/// How the external delivery program is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Program followed by any fixed leading arguments.
    #[serde(default = "default_delivery_command")]
    pub command: Vec<String>,

    /// Gateway endpoint handed to the child as `OPENCLAW_GATEWAY_URL`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,

    /// Gateway credential handed to the child as `OPENCLAW_GATEWAY_TOKEN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_token: Option<String>,

    /// Time a delivery may overrun its timeout before it is terminated.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Delay between SIGTERM and SIGKILL.
    #[serde(default = "default_kill_after_ms")]
    pub kill_after_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            command: default_delivery_command(),
            gateway_url: None,
            gateway_token: None,
            grace_period_ms: default_grace_period_ms(),
            kill_after_ms: default_kill_after_ms(),
        }
    }
}

fn default_delivery_command() -> Vec<String> {
    vec!["openclaw".to_string()]
}

fn default_grace_period_ms() -> u64 {
    120_000
}

fn default_kill_after_ms() -> u64 {
    5_000
}

/// Defaults stamped onto newly created jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_agent")]
    pub agent: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            timeout_ms: default_timeout_ms(),
            max_retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
            agent: default_agent(),
            channel: None,
        }
    }
}

fn default_timezone() -> String {
    clawgate_schedule::host_timezone()
}

fn default_timeout_ms() -> u64 {
    120_000
}

fn default_retry_delay_ms() -> u64 {
    60_000
}

fn default_agent() -> String {
    "main".to_string()
}

/// Agent to reply-account routing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub reply_accounts: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_account: Option<String>,
}

impl RoutingConfig {
    /// Account that replies from `agent_id` should be sent through.
    pub fn reply_account(&self, agent_id: &str) -> Option<&str> {
        self.reply_accounts
            .get(agent_id)
            .or(self.default_account.as_ref())
            .map(String::as_str)
    }
}

/// Which trigger table the synchronizer edits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrontabBackendKind {
    /// The invoking user's crontab, via the `crontab` command.
    #[default]
    System,
    /// A plain file in crontab format.
    File,
}

/// Crontab synchronisation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrontabConfig {
    #[serde(default)]
    pub backend: CrontabBackendKind,

    /// Table path for the file backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// `clawgate` executable written into trigger lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<PathBuf>,

    /// File that cron appends trigger output to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
