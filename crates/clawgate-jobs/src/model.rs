//! Job record model.
//!
//! Field names are camelCase on disk; the `schedule`, `execution` and `state`
//! objects are read by external tooling and keep their shape.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Lowest accepted per-run timeout.
pub const MIN_TIMEOUT_MS: u64 = 1_000;

/// A scheduled unit of message delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub name: String,
    /// Human readable schedule, as produced by the compiler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub schedule: Schedule,
    pub target: Target,
    pub payload: Payload,
    pub execution: ExecutionSettings,
    #[serde(default)]
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub cron_expression: String,
    pub timezone: String,
    #[serde(default)]
    pub next_run: Option<DateTime<Utc>>,
}

impl Schedule {
    pub fn new(cron_expression: impl Into<String>, timezone: impl Into<String>) -> Self {
        Self {
            cron_expression: cron_expression.into(),
            timezone: timezone.into(),
            next_run: None,
        }
    }

    /// Recompute `next_run` from `now`. An expression that cannot be
    /// evaluated leaves `next_run` empty.
    pub fn refresh_next_run(&mut self, now: DateTime<Utc>) {
        self.next_run =
            match clawgate_schedule::next_run(&self.cron_expression, &self.timezone, now) {
                Ok(next) => next,
                Err(e) => {
                    warn!("Cannot compute next run for '{}': {}", self.cron_expression, e);
                    None
                }
            };
    }
}

/// Where a delivery is addressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Target {
    /// A turn for an agent, optionally relayed to a channel recipient.
    Agent {
        agent_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply_account: Option<String>,
    },
    /// A message sent straight to a channel recipient.
    Message {
        channel: String,
        to: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply_account: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_id: Option<String>,
    },
}

impl Target {
    pub fn agent(agent_id: impl Into<String>) -> Self {
        Target::Agent {
            agent_id: agent_id.into(),
            channel: None,
            to: None,
            reply_account: None,
        }
    }

    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Target::Agent { agent_id, .. } => Some(agent_id),
            Target::Message { agent_id, .. } => agent_id.as_deref(),
        }
    }

    pub fn reply_account(&self) -> Option<&str> {
        match self {
            Target::Agent { reply_account, .. } | Target::Message { reply_account, .. } => {
                reply_account.as_deref()
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Target::Agent { .. } => "agent",
            Target::Message { .. } => "message",
        }
    }
}

/// Message content, resolved at execution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Payload {
    Text {
        content: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        variables: BTreeMap<String, String>,
    },
    /// Named file under the templates directory.
    Template {
        template: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        variables: BTreeMap<String, String>,
    },
    /// Path relative to the templates directory, or absolute.
    File {
        path: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        variables: BTreeMap<String, String>,
    },
}

impl Payload {
    pub fn text(content: impl Into<String>) -> Self {
        Payload::Text {
            content: content.into(),
            variables: BTreeMap::new(),
        }
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        match self {
            Payload::Text { variables, .. }
            | Payload::Template { variables, .. }
            | Payload::File { variables, .. } => variables,
        }
    }

    pub fn variables_mut(&mut self) -> &mut BTreeMap<String, String> {
        match self {
            Payload::Text { variables, .. }
            | Payload::Template { variables, .. }
            | Payload::File { variables, .. } => variables,
        }
    }

    /// One-line rendering for listings.
    pub fn summary(&self, width: usize) -> String {
        let raw = match self {
            Payload::Text { content, .. } => content.clone(),
            Payload::Template { template, .. } => format!("template:{template}"),
            Payload::File { path, .. } => format!("file:{path}"),
        };
        let flat = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if flat.chars().count() <= width {
            flat
        } else {
            let cut: String = flat.chars().take(width.saturating_sub(3)).collect();
            format!("{cut}...")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub timeout_ms: u64,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub auto_delete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_runs: Option<u32>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunResult {
    Success,
    Failure,
}

impl RunResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunResult::Success => "success",
            RunResult::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobState {
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_result: Option<RunResult>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub run_count: u64,
    #[serde(default)]
    pub fail_count: u64,
}

/// Values applied to fields a caller leaves unset on create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDefaults {
    pub timezone: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for JobDefaults {
    fn default() -> Self {
        Self {
            timezone: clawgate_schedule::host_timezone(),
            timeout_ms: 120_000,
            max_retries: 0,
            retry_delay_ms: 60_000,
        }
    }
}

/// Caller input for [`crate::JobStore::create`].
#[derive(Debug, Clone)]
pub struct NewJob {
    pub name: String,
    pub cron_expression: String,
    pub description: Option<String>,
    pub timezone: Option<String>,
    pub target: Target,
    pub payload: Payload,
    pub enabled: Option<bool>,
    pub timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub auto_delete: bool,
    pub max_runs: Option<u32>,
}

impl NewJob {
    pub fn new(
        name: impl Into<String>,
        cron_expression: impl Into<String>,
        target: Target,
        payload: Payload,
    ) -> Self {
        Self {
            name: name.into(),
            cron_expression: cron_expression.into(),
            description: None,
            timezone: None,
            target,
            payload,
            enabled: None,
            timeout_ms: None,
            max_retries: None,
            retry_delay_ms: None,
            auto_delete: false,
            max_runs: None,
        }
    }

    pub fn with_max_runs(mut self, max_runs: u32) -> Self {
        self.max_runs = Some(max_runs);
        self
    }

    pub fn with_auto_delete(mut self, auto_delete: bool) -> Self {
        self.auto_delete = auto_delete;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Build the record, filling unset fields from `defaults`.
    pub(crate) fn into_job(
        self,
        id: String,
        defaults: &JobDefaults,
        now: DateTime<Utc>,
    ) -> Job {
        let mut schedule = Schedule::new(
            self.cron_expression,
            self.timezone.unwrap_or_else(|| defaults.timezone.clone()),
        );
        schedule.refresh_next_run(now);

        Job {
            id,
            name: self.name,
            description: self.description,
            schedule,
            target: self.target,
            payload: self.payload,
            execution: ExecutionSettings {
                enabled: self.enabled.unwrap_or(true),
                timeout_ms: self.timeout_ms.unwrap_or(defaults.timeout_ms),
                max_retries: self.max_retries.unwrap_or(defaults.max_retries),
                retry_delay_ms: self.retry_delay_ms.unwrap_or(defaults.retry_delay_ms),
                auto_delete: self.auto_delete,
                max_runs: self.max_runs,
            },
            state: JobState::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial edit for [`crate::JobStore::update`]. The id is not editable.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub name: Option<String>,
    pub cron_expression: Option<String>,
    pub description: Option<String>,
    pub timezone: Option<String>,
    pub target: Option<Target>,
    pub payload: Option<Payload>,
    pub enabled: Option<bool>,
    pub timeout_ms: Option<u64>,
    pub auto_delete: Option<bool>,
    /// `Some(None)` clears the run budget.
    pub max_runs: Option<Option<u32>>,
}

impl JobUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.cron_expression.is_none()
            && self.description.is_none()
            && self.timezone.is_none()
            && self.target.is_none()
            && self.payload.is_none()
            && self.enabled.is_none()
            && self.timeout_ms.is_none()
            && self.auto_delete.is_none()
            && self.max_runs.is_none()
    }

    pub(crate) fn apply(self, job: &mut Job, now: DateTime<Utc>) {
        let reschedule = self.cron_expression.is_some() || self.timezone.is_some();

        if let Some(name) = self.name {
            job.name = name;
        }
        if let Some(expr) = self.cron_expression {
            job.schedule.cron_expression = expr;
        }
        if let Some(description) = self.description {
            job.description = Some(description);
        }
        if let Some(timezone) = self.timezone {
            job.schedule.timezone = timezone;
        }
        if let Some(target) = self.target {
            job.target = target;
        }
        if let Some(payload) = self.payload {
            job.payload = payload;
        }
        if let Some(enabled) = self.enabled {
            job.execution.enabled = enabled;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            job.execution.timeout_ms = timeout_ms;
        }
        if let Some(auto_delete) = self.auto_delete {
            job.execution.auto_delete = auto_delete;
        }
        if let Some(max_runs) = self.max_runs {
            job.execution.max_runs = max_runs;
        }

        if reschedule {
            job.schedule.refresh_next_run(now);
        }
        job.updated_at = now;
    }
}

/// Partial state write for [`crate::JobStore::update_state`].
///
/// `last_error` is doubly optional: `Some(None)` clears a previous error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateUpdate {
    pub last_run: Option<DateTime<Utc>>,
    pub last_result: Option<RunResult>,
    pub last_error: Option<Option<String>>,
    pub run_count: Option<u64>,
    pub fail_count: Option<u64>,
}

impl StateUpdate {
    /// The state change for one finished attempt on top of `current`.
    pub fn record_run(
        current: &JobState,
        result: RunResult,
        error: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let failed = result == RunResult::Failure;
        Self {
            last_run: Some(at),
            last_result: Some(result),
            last_error: Some(error),
            run_count: Some(current.run_count + 1),
            fail_count: Some(current.fail_count + u64::from(failed)),
        }
    }

    /// Merge into `state`. Counters never move backwards.
    pub(crate) fn apply(self, state: &mut JobState) {
        if let Some(last_run) = self.last_run {
            state.last_run = Some(last_run);
        }
        if let Some(result) = self.last_result {
            state.last_result = Some(result);
        }
        if let Some(error) = self.last_error {
            state.last_error = error;
        }
        if let Some(count) = self.run_count {
            state.run_count = state.run_count.max(count);
        }
        if let Some(count) = self.fail_count {
            state.fail_count = state.fail_count.max(count);
        }
    }
}

impl Job {
    /// Semantic checks beyond what deserialization enforces.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.id.trim().is_empty() {
            problems.push("id is empty".to_string());
        }
        if self.name.trim().is_empty() {
            problems.push("name is empty".to_string());
        }
        if let Err(e) = clawgate_schedule::validate_cron(&self.schedule.cron_expression) {
            problems.push(e.to_string());
        }
        if let Err(e) = clawgate_schedule::parse_timezone(&self.schedule.timezone) {
            problems.push(e.to_string());
        }
        if self.execution.timeout_ms < MIN_TIMEOUT_MS {
            problems.push(format!(
                "timeoutMs {} is below the {} ms minimum",
                self.execution.timeout_ms, MIN_TIMEOUT_MS
            ));
        }
        if self.execution.max_runs == Some(0) {
            problems.push("maxRuns must be positive".to_string());
        }
        if self.state.fail_count > self.state.run_count {
            problems.push("failCount exceeds runCount".to_string());
        }
        match &self.target {
            Target::Agent { agent_id, .. } if agent_id.trim().is_empty() => {
                problems.push("target agentId is empty".to_string());
            }
            Target::Message { channel, to, .. }
                if channel.trim().is_empty() || to.trim().is_empty() =>
            {
                problems.push("message target needs a channel and recipient".to_string());
            }
            _ => {}
        }

        problems
    }

    /// Whether the run budget from `maxRuns` is used up.
    pub fn runs_exhausted(&self) -> bool {
        self.execution
            .max_runs
            .is_some_and(|max| self.state.run_count >= u64::from(max))
    }

    /// Whether the job should be removed after an attempt that ended with `result`.
    pub fn should_auto_delete(&self, result: RunResult) -> bool {
        self.runs_exhausted() || (self.execution.auto_delete && result == RunResult::Success)
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
