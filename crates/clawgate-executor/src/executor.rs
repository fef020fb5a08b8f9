//! One execution attempt of a job.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use clawgate_config::Config;
use clawgate_crontab::CrontabSync;
use clawgate_jobs::{ExecutionLock, Job, JobStore, RunResult, StateUpdate};
use tracing::{error, info, warn};

use crate::delivery::DeliveryBuilder;
use crate::error::ExecutorError;
use crate::log::{ExecutionLog, LogEntry, Trigger};
use crate::payload::PayloadResolver;
use crate::runner::{self, RunLimits, RunOutput};

#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Build the delivery command without running it or taking the lock.
    pub dry_run: bool,
    /// Run even if the job is disabled.
    pub force: bool,
    /// Highest-priority placeholder values.
    pub variables: BTreeMap<String, String>,
}

/// Classified result of an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Dry run; nothing was spawned.
    DryRun,
    Disabled,
    AlreadyRunning { pid: Option<u32> },
    /// The payload could not be resolved; delivery was not attempted.
    PayloadError(String),
    /// The delivery program could not be started.
    SpawnFailed(String),
    /// The delivery program exited non-zero.
    Failed { exit_code: Option<i32> },
    /// The delivery program outlived its grace period and was stopped.
    TimedOut,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success | Outcome::DryRun)
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub job_id: String,
    pub job_name: String,
    pub outcome: Outcome,
    /// Redacted delivery command, when one was built.
    pub command: Option<String>,
    /// Resolved message, only filled for dry runs.
    pub message: Option<String>,
    pub duration: Duration,
    pub stdout: String,
    pub stderr: String,
    /// The job record after the state update, if it still exists.
    pub job: Option<Job>,
    pub auto_deleted: bool,
}

impl ExecutionReport {
    fn skipped(job: &Job, outcome: Outcome) -> Self {
        Self {
            job_id: job.id.clone(),
            job_name: job.name.clone(),
            outcome,
            command: None,
            message: None,
            duration: Duration::ZERO,
            stdout: String::new(),
            stderr: String::new(),
            job: Some(job.clone()),
            auto_deleted: false,
        }
    }
}

/// Runs jobs: enablement, locking, payload, delivery, bookkeeping.
pub struct Executor {
    store: Arc<dyn JobStore>,
    lock: ExecutionLock,
    crontab: Option<Arc<CrontabSync>>,
    resolver: PayloadResolver,
    delivery: DeliveryBuilder,
    log: ExecutionLog,
    grace: Duration,
    kill_after: Duration,
}

impl Executor {
    pub fn new(config: &Config, store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            lock: ExecutionLock::new(config.paths.locks_dir()),
            crontab: None,
            resolver: PayloadResolver::new(config.paths.templates_dir()),
            delivery: DeliveryBuilder::new(config.delivery.clone(), config.routing.clone()),
            log: ExecutionLog::new(config.paths.logs_dir()),
            grace: Duration::from_millis(config.delivery.grace_period_ms),
            kill_after: Duration::from_millis(config.delivery.kill_after_ms),
        }
    }

    /// Remove crontab entries of auto-deleted jobs through `crontab`.
    pub fn with_crontab(mut self, crontab: Arc<CrontabSync>) -> Self {
        self.crontab = Some(crontab);
        self
    }

    pub fn lock(&self) -> &ExecutionLock {
        &self.lock
    }

    pub fn log(&self) -> &ExecutionLog {
        &self.log
    }

    pub async fn execute(
        &self,
        job_id: &str,
        options: &ExecuteOptions,
    ) -> Result<ExecutionReport, ExecutorError> {
        let job = self
            .store
            .get(job_id)
            .await?
            .ok_or_else(|| ExecutorError::JobNotFound(job_id.to_string()))?;

        if !job.execution.enabled && !options.force {
            info!("Job '{}' is disabled; skipping", job.id);
            return Ok(ExecutionReport::skipped(&job, Outcome::Disabled));
        }

        if options.dry_run {
            return self.dry_run(&job, options);
        }

        let Some(guard) = self.lock.acquire(&job.id)? else {
            let pid = self.lock.get_lock_info(&job.id)?.map(|info| info.pid);
            warn!("Job '{}' is already running (pid {:?})", job.id, pid);
            return Ok(ExecutionReport::skipped(&job, Outcome::AlreadyRunning { pid }));
        };

        let message = match self.resolver.resolve(&job.payload, &options.variables, Local::now()) {
            Ok(message) => message,
            Err(e) => {
                error!("Job '{}' payload could not be resolved: {}", job.id, e);
                drop(guard);
                return Ok(ExecutionReport::skipped(&job, Outcome::PayloadError(e.to_string())));
            }
        };
        let command = self.delivery.build(&job, &message)?;
        let limits = RunLimits {
            timeout: Duration::from_millis(job.execution.timeout_ms),
            grace: self.grace,
            kill_after: self.kill_after,
        };

        info!("Executing job '{}' ({})", job.name, job.id);
        let started_at = Utc::now();
        let run = runner::run(&command, limits).await;

        if let Err(e) = guard.release() {
            warn!("Failed to release lock for job '{}': {}", job.id, e);
        }

        let (outcome, output) = classify(run);
        let result = if outcome == Outcome::Success {
            RunResult::Success
        } else {
            RunResult::Failure
        };
        let error_text = describe_failure(&outcome, output.as_ref());
        match &outcome {
            Outcome::Success => info!("Job '{}' delivered", job.id),
            other => error!("Job '{}' failed: {:?}", job.id, other),
        }

        let duration = output
            .as_ref()
            .map(|o| o.duration)
            .unwrap_or_else(|| (Utc::now() - started_at).to_std().unwrap_or_default());
        let (stdout, stderr) = output
            .as_ref()
            .map(|o| (o.stdout.clone(), o.stderr.clone()))
            .unwrap_or_default();

        let entry = LogEntry {
            timestamp: started_at,
            job_id: job.id.clone(),
            job_name: job.name.clone(),
            trigger: if options.force { Trigger::Forced } else { Trigger::Manual },
            command: command.redacted(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            result: match &outcome {
                Outcome::Success => "success",
                Outcome::TimedOut => "timeout",
                _ => "failure",
            }
            .to_string(),
            exit_code: output.as_ref().and_then(|o| o.exit_code),
            exceeded_timeout: output.as_ref().is_some_and(RunOutput::exceeded_timeout),
            error: error_text.clone(),
            stdout: stdout.clone(),
            stderr: stderr.clone(),
        };
        if let Err(e) = self.log.append(&entry).await {
            warn!("Failed to write execution log for job '{}': {}", job.id, e);
        }

        let update = StateUpdate::record_run(&job.state, result, error_text, started_at);
        let updated = self.store.update_state(&job.id, update).await?;

        let auto_deleted = match &updated {
            Some(current) if current.should_auto_delete(result) => {
                self.auto_delete(current).await?;
                true
            }
            _ => false,
        };

        Ok(ExecutionReport {
            job_id: job.id.clone(),
            job_name: job.name.clone(),
            outcome,
            command: Some(command.redacted()),
            message: None,
            duration,
            stdout,
            stderr,
            job: if auto_deleted { None } else { updated },
            auto_deleted,
        })
    }

    fn dry_run(&self, job: &Job, options: &ExecuteOptions) -> Result<ExecutionReport, ExecutorError> {
        let message = match self.resolver.resolve(&job.payload, &options.variables, Local::now()) {
            Ok(message) => message,
            Err(e) => {
                return Ok(ExecutionReport::skipped(job, Outcome::PayloadError(e.to_string())));
            }
        };
        let command = self.delivery.build(job, &message)?;

        let mut report = ExecutionReport::skipped(job, Outcome::DryRun);
        report.command = Some(command.redacted());
        report.message = Some(command.message().to_string());
        Ok(report)
    }

    /// Trigger first, record second: a crash in between leaves a record
    /// without a trigger, which `cron --install` repairs.
    async fn auto_delete(&self, job: &Job) -> Result<(), ExecutorError> {
        if let Some(crontab) = &self.crontab {
            crontab.remove(&job.id)?;
        }
        self.store.delete(&job.id).await?;

        let reason = match job.execution.max_runs {
            Some(max) if job.runs_exhausted() => format!("reached {max} runs"),
            _ => "one-time job succeeded".to_string(),
        };
        info!("Auto-deleted job '{}' ({})", job.id, reason);
        Ok(())
    }
}

fn classify(run: std::io::Result<RunOutput>) -> (Outcome, Option<RunOutput>) {
    match run {
        Err(e) => (Outcome::SpawnFailed(e.to_string()), None),
        Ok(output) if output.succeeded() => (Outcome::Success, Some(output)),
        Ok(output) if output.timed_out() => (Outcome::TimedOut, Some(output)),
        Ok(output) => {
            let exit_code = output.exit_code;
            (Outcome::Failed { exit_code }, Some(output))
        }
    }
}

fn describe_failure(outcome: &Outcome, output: Option<&RunOutput>) -> Option<String> {
    let text = match outcome {
        Outcome::Success | Outcome::DryRun | Outcome::Disabled => return None,
        Outcome::AlreadyRunning { .. } => "already running".to_string(),
        Outcome::PayloadError(e) => e.clone(),
        Outcome::SpawnFailed(e) => format!("failed to start delivery: {e}"),
        Outcome::Failed { exit_code: Some(code) } => format!("delivery exited with code {code}"),
        Outcome::Failed { exit_code: None } => "delivery was killed by a signal".to_string(),
        Outcome::TimedOut => "delivery timed out and was terminated".to_string(),
    };

    let detail = output
        .map(|o| o.stderr.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.lines().last().unwrap_or(s).to_string());
    Some(match detail {
        Some(detail) => format!("{text}: {detail}"),
        None => text,
    })
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
