//! Crontab synchronizer.

use std::path::PathBuf;

use clawgate_jobs::Job;
use tracing::{debug, info};

use crate::backend::CrontabBackend;
use crate::error::CrontabError;
use crate::table::{CrontabEntry, CrontabTable};

/// Keeps the managed crontab region in step with the job store.
///
/// Every write reads the whole table, edits the managed entries and writes
/// the whole table back. Concurrent writers are last-writer-wins.
///
/// Trigger lines carry no `CRON_TZ`; they fire in the host's local time.
pub struct CrontabSync {
    backend: Box<dyn CrontabBackend>,
    command: String,
    log_file: Option<PathBuf>,
}

impl CrontabSync {
    /// `command` is the program trigger lines invoke as `<command> execute <id>`.
    pub fn new(backend: Box<dyn CrontabBackend>, command: impl Into<String>) -> Self {
        Self {
            backend,
            command: command.into(),
            log_file: None,
        }
    }

    /// Append trigger output to `log_file`.
    pub fn with_log_file(mut self, log_file: Option<PathBuf>) -> Self {
        self.log_file = log_file;
        self
    }

    pub fn backend(&self) -> &dyn CrontabBackend {
        self.backend.as_ref()
    }

    /// Add or replace the trigger for `job_id`.
    pub fn add(&self, job_id: &str, cron_expression: &str) -> Result<(), CrontabError> {
        let entry = CrontabEntry::new(job_id, cron_expression)?;
        self.modify(|table| {
            table.upsert(entry);
            true
        })?;
        info!("Scheduled job '{}' at '{}'", job_id, cron_expression);
        Ok(())
    }

    /// Drop the trigger for `job_id`, reporting whether one existed.
    pub fn remove(&self, job_id: &str) -> Result<bool, CrontabError> {
        let removed = self.modify(|table| table.remove(job_id))?;
        if removed {
            info!("Removed crontab entry for job '{}'", job_id);
        }
        Ok(removed)
    }

    /// Managed entries in table order.
    pub fn list(&self) -> Result<Vec<CrontabEntry>, CrontabError> {
        let table = CrontabTable::parse(&self.backend.read()?)?;
        Ok(table.entries().to_vec())
    }

    /// Rebuild the managed region from `jobs`. Disabled jobs get no trigger.
    pub fn install(&self, jobs: &[Job]) -> Result<usize, CrontabError> {
        let entries = jobs
            .iter()
            .filter(|job| job.execution.enabled)
            .map(|job| CrontabEntry::new(&job.id, &job.schedule.cron_expression))
            .collect::<Result<Vec<_>, _>>()?;
        let count = entries.len();

        self.modify(|table| {
            table.replace_all(entries);
            true
        })?;
        info!("Installed {} crontab entries into {}", count, self.backend.describe());
        Ok(count)
    }

    /// Empty the managed region, returning how many entries were removed.
    pub fn uninstall(&self) -> Result<usize, CrontabError> {
        let mut removed = 0;
        self.modify(|table| {
            removed = table.entries().len();
            table.replace_all(Vec::new());
            removed > 0
        })?;
        info!("Removed {} crontab entries from {}", removed, self.backend.describe());
        Ok(removed)
    }

    /// The managed region as it would be written, for display.
    pub fn render_region(&self) -> Result<String, CrontabError> {
        let table = CrontabTable::parse(&self.backend.read()?)?;
        Ok(table.render_region(&self.command, self.log_file.as_deref()))
    }

    /// Apply `edit` and write back if it reports a change.
    fn modify<F>(&self, edit: F) -> Result<bool, CrontabError>
    where
        F: FnOnce(&mut CrontabTable) -> bool,
    {
        let current = self.backend.read()?;
        let mut table = CrontabTable::parse(&current)?;
        if !edit(&mut table) {
            return Ok(false);
        }

        let rendered = table.render(&self.command, self.log_file.as_deref());
        if rendered != current {
            self.backend.write(&rendered)?;
        } else {
            debug!("Crontab unchanged");
        }
        Ok(true)
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
