//! Per-job execution locks.
//!
//! A lock is a `<locks_dir>/<job-id>.lock` marker holding the owner's pid and
//! start time. Markers whose owner is no longer alive are stale and get
//! purged on the next check. Locking is advisory and single-host.
//!
//! Purges are serialized through a `<job-id>.lock.purge` marker, and a stale
//! marker is only removed if it still holds the bytes that were judged stale.
//! A lock written by another process in between is left alone.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::LockError;
use crate::store::sanitize_id;

/// Age under which an unreadable marker is assumed to be mid-write.
const UNREADABLE_GRACE: Duration = Duration::from_secs(10);

/// Contents of a lock marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockInfo {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

impl LockInfo {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            started_at: Utc::now(),
        }
    }
}

/// Lock manager over a directory of markers.
#[derive(Debug, Clone)]
pub struct ExecutionLock {
    locks_dir: PathBuf,
}

impl ExecutionLock {
    pub fn new(locks_dir: impl Into<PathBuf>) -> Self {
        Self {
            locks_dir: locks_dir.into(),
        }
    }

    pub fn locks_dir(&self) -> &Path {
        &self.locks_dir
    }

    fn lock_path(&self, job_id: &str) -> PathBuf {
        self.locks_dir.join(format!("{}.lock", sanitize_id(job_id)))
    }

    /// Try to take the lock for `job_id`. Returns `false` if a live process
    /// already holds it.
    pub fn lock(&self, job_id: &str) -> Result<bool, LockError> {
        if self.is_locked(job_id)? {
            return Ok(false);
        }

        fs::create_dir_all(&self.locks_dir).map_err(|e| LockError::io(&self.locks_dir, e))?;

        let path = self.lock_path(job_id);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            // Another process won the race between the check and the create.
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(LockError::io(&path, e)),
        };

        let info = LockInfo::current();
        let encoded = serde_json::to_vec(&info)?;
        if let Err(e) = file.write_all(&encoded).and_then(|_| file.sync_all()) {
            let _ = fs::remove_file(&path);
            return Err(LockError::io(&path, e));
        }

        debug!("Locked job '{}' (pid {})", job_id, info.pid);
        Ok(true)
    }

    /// Take the lock and return a guard that releases it on drop.
    pub fn acquire(&self, job_id: &str) -> Result<Option<LockGuard>, LockError> {
        if !self.lock(job_id)? {
            return Ok(None);
        }
        Ok(Some(LockGuard {
            lock: self.clone(),
            job_id: job_id.to_string(),
            held: true,
        }))
    }

    /// Remove the marker. Missing markers are not an error.
    pub fn unlock(&self, job_id: &str) -> Result<(), LockError> {
        remove_if_present(&self.lock_path(job_id))?;
        debug!("Unlocked job '{}'", job_id);
        Ok(())
    }

    /// Whether a live process holds the lock. Stale markers are removed.
    pub fn is_locked(&self, job_id: &str) -> Result<bool, LockError> {
        let path = self.lock_path(job_id);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(LockError::io(&path, e)),
        };

        match serde_json::from_slice::<LockInfo>(&content) {
            Ok(info) if is_process_running(info.pid) => Ok(true),
            Ok(info) => {
                warn!(
                    "Removing stale lock for job '{}' (pid {} not running)",
                    job_id, info.pid
                );
                Ok(!self.purge_stale(job_id, &path, &content)?)
            }
            Err(_) if recently_modified(&path) => Ok(true),
            Err(e) => {
                warn!("Removing unreadable lock for job '{}': {}", job_id, e);
                Ok(!self.purge_stale(job_id, &path, &content)?)
            }
        }
    }

    /// Remove the marker at `path` if it still holds `seen`. Returns whether
    /// the lock is free afterwards.
    fn purge_stale(&self, job_id: &str, path: &Path, seen: &[u8]) -> Result<bool, LockError> {
        let purge_path = path.with_extension("lock.purge");
        match OpenOptions::new().write(true).create_new(true).open(&purge_path) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if !recently_modified(&purge_path) {
                    warn!("Removing abandoned purge marker for job '{}'", job_id);
                    remove_if_present(&purge_path)?;
                }
                return Ok(false);
            }
            Err(e) => return Err(LockError::io(&purge_path, e)),
        }

        let outcome = match fs::read(path) {
            Ok(current) if current == seen => remove_if_present(path).map(|()| true),
            Ok(_) => {
                debug!("Lock for job '{}' was retaken before the purge", job_id);
                Ok(false)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
            Err(e) => Err(LockError::io(path, e)),
        };
        remove_if_present(&purge_path)?;
        outcome
    }

    /// Owner of the lock, if it is currently held.
    pub fn get_lock_info(&self, job_id: &str) -> Result<Option<LockInfo>, LockError> {
        if !self.is_locked(job_id)? {
            return Ok(None);
        }
        let path = self.lock_path(job_id);
        match fs::read(&path) {
            Ok(content) => Ok(serde_json::from_slice(&content).ok()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LockError::io(&path, e)),
        }
    }
}

/// Held lock; released when dropped.
#[derive(Debug)]
pub struct LockGuard {
    lock: ExecutionLock,
    job_id: String,
    held: bool,
}

impl LockGuard {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Release now, surfacing any error instead of logging it.
    pub fn release(mut self) -> Result<(), LockError> {
        self.held = false;
        self.lock.unlock(&self.job_id)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.held {
            if let Err(e) = self.lock.unlock(&self.job_id) {
                warn!("Failed to release lock on drop: {}", e);
            }
        }
    }
}

fn remove_if_present(path: &Path) -> Result<(), LockError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LockError::io(path, e)),
    }
}

fn recently_modified(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.elapsed().ok())
        .is_some_and(|age| age < UNREADABLE_GRACE)
}

/// Check if a process with the given PID is running.
#[cfg(unix)]
pub(crate) fn is_process_running(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }

    // Signal 0 probes for existence; EPERM means it exists under another user.
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub(crate) fn is_process_running(_pid: u32) -> bool {
    // On non-Unix systems, assume process is running if we can't check
    true
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
