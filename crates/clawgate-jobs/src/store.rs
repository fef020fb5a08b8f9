//! Job persistence store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::JobStoreError;
use crate::model::{Job, JobDefaults, JobUpdate, NewJob, StateUpdate};

/// Keyed job persistence.
///
/// Backends implement the four primitives; the record-level operations are
/// provided on top of them.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Defaults applied on [`JobStore::create`].
    fn defaults(&self) -> &JobDefaults;

    /// Persist a job, replacing any record with the same id.
    async fn save(&self, job: &Job) -> Result<(), JobStoreError>;

    /// Load a job by id.
    async fn load(&self, id: &str) -> Result<Option<Job>, JobStoreError>;

    /// Load every readable job.
    async fn load_all(&self) -> Result<Vec<Job>, JobStoreError>;

    /// Remove a job, reporting whether it existed.
    async fn remove(&self, id: &str) -> Result<bool, JobStoreError>;

    /// Validate `input`, assign a fresh id and persist the new job.
    async fn create(&self, input: NewJob) -> Result<Job, JobStoreError> {
        let id = loop {
            let candidate = generate_id();
            if self.load(&candidate).await?.is_none() {
                break candidate;
            }
        };

        let job = input.into_job(id, self.defaults(), Utc::now());
        let problems = job.problems();
        if !problems.is_empty() {
            return Err(JobStoreError::Validation(problems.join("; ")));
        }

        self.save(&job).await?;
        info!("Created job '{}' ({})", job.name, job.id);
        Ok(job)
    }

    async fn get(&self, id: &str) -> Result<Option<Job>, JobStoreError> {
        self.load(id).await
    }

    /// All jobs, sorted by name.
    async fn list(&self) -> Result<Vec<Job>, JobStoreError> {
        let mut jobs = self.load_all().await?;
        jobs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(jobs)
    }

    /// Merge `update` into an existing job.
    async fn update(&self, id: &str, update: JobUpdate) -> Result<Option<Job>, JobStoreError> {
        let Some(mut job) = self.load(id).await? else {
            return Ok(None);
        };

        update.apply(&mut job, Utc::now());
        let problems = job.problems();
        if !problems.is_empty() {
            return Err(JobStoreError::Validation(problems.join("; ")));
        }

        self.save(&job).await?;
        debug!("Updated job '{}'", id);
        Ok(Some(job))
    }

    /// Merge `update` into the job's state and recompute its next run.
    async fn update_state(
        &self,
        id: &str,
        update: StateUpdate,
    ) -> Result<Option<Job>, JobStoreError> {
        let Some(mut job) = self.load(id).await? else {
            return Ok(None);
        };

        let now = Utc::now();
        update.apply(&mut job.state);
        job.schedule.refresh_next_run(now);
        job.updated_at = now;

        self.save(&job).await?;
        Ok(Some(job))
    }

    async fn delete(&self, id: &str) -> Result<bool, JobStoreError> {
        let removed = self.remove(id).await?;
        if removed {
            info!("Deleted job '{}'", id);
        }
        Ok(removed)
    }
}

/// `job-` followed by twelve hex digits.
fn generate_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("job-{}", &hex[..12])
}

/// Decode a stored record.
///
/// A record that does not match the current shape is merged over a
/// well-formed skeleton so partially valid data is still surfaced.
/// Semantic problems are logged but do not hide the record.
pub(crate) fn decode_record(id: &str, content: &str) -> Result<Job, JobStoreError> {
    let corrupt = |reason: String| JobStoreError::Corrupt {
        id: id.to_string(),
        reason,
    };

    let job = match serde_json::from_str::<Job>(content) {
        Ok(job) => job,
        Err(strict) => {
            let value: Value =
                serde_json::from_str(content).map_err(|e| corrupt(e.to_string()))?;
            if !value.is_object() {
                return Err(corrupt("record is not a JSON object".to_string()));
            }

            let mut merged = skeleton(id)?;
            merge(&mut merged, value);
            let job: Job = serde_json::from_value(merged).map_err(|e| corrupt(e.to_string()))?;
            warn!("Job '{}' did not match the record shape ({}); loaded with defaults", id, strict);
            job
        }
    };

    for problem in job.problems() {
        warn!("Job '{}' failed validation: {}", id, problem);
    }
    Ok(job)
}

fn skeleton(id: &str) -> Result<Value, JobStoreError> {
    let job = NewJob::new(
        id,
        "0 9 * * *",
        crate::model::Target::agent("main"),
        crate::model::Payload::text(""),
    )
    .with_enabled(false)
    .into_job(id.to_string(), &JobDefaults::default(), Utc::now());
    Ok(serde_json::to_value(job)?)
}

fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                if value.is_null() {
                    continue;
                }
                if let Some(slot) = base.get_mut(&key) {
                    if slot.is_object() && value.is_object() {
                        merge(slot, value);
                        continue;
                    }
                }
                base.insert(key, value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// In-memory job store for testing.
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
    defaults: JobDefaults,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::with_defaults(JobDefaults::default())
    }

    pub fn with_defaults(defaults: JobDefaults) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            defaults,
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    fn defaults(&self) -> &JobDefaults {
        &self.defaults
    }

    async fn save(&self, job: &Job) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Job>, JobStoreError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(id).cloned())
    }

    async fn load_all(&self) -> Result<Vec<Job>, JobStoreError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.values().cloned().collect())
    }

    async fn remove(&self, id: &str) -> Result<bool, JobStoreError> {
        let mut jobs = self.jobs.write().await;
        Ok(jobs.remove(id).is_some())
    }
}

/// One `<id>.json` file per job.
pub struct FileJobStore {
    jobs_dir: PathBuf,
    defaults: JobDefaults,
}

impl FileJobStore {
    /// Open a store rooted at `jobs_dir`, creating the directory.
    pub async fn new(
        jobs_dir: impl Into<PathBuf>,
        defaults: JobDefaults,
    ) -> Result<Self, JobStoreError> {
        let jobs_dir = jobs_dir.into();
        fs::create_dir_all(&jobs_dir)
            .await
            .map_err(|e| JobStoreError::io(&jobs_dir, e))?;

        debug!("FileJobStore initialized at {:?}", jobs_dir);
        Ok(Self { jobs_dir, defaults })
    }

    pub fn jobs_dir(&self) -> &Path {
        &self.jobs_dir
    }

    fn job_path(&self, id: &str) -> PathBuf {
        self.jobs_dir.join(format!("{}.json", sanitize_id(id)))
    }
}

/// File stem for per-job files: anything but letters, digits, `-` and `_`
/// becomes `_`, so an id never escapes its directory.
pub fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl JobStore for FileJobStore {
    fn defaults(&self) -> &JobDefaults {
        &self.defaults
    }

    async fn save(&self, job: &Job) -> Result<(), JobStoreError> {
        let path = self.job_path(&job.id);
        let content = serde_json::to_string_pretty(job)?;

        // Write beside the target and rename so readers never see a partial file.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, content)
            .await
            .map_err(|e| JobStoreError::io(&staging, e))?;
        fs::rename(&staging, &path)
            .await
            .map_err(|e| JobStoreError::io(&path, e))?;

        debug!("Saved job '{}' to {:?}", job.id, path);
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Job>, JobStoreError> {
        let path = self.job_path(id);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(JobStoreError::io(&path, e)),
        };

        decode_record(id, &content).map(Some)
    }

    async fn load_all(&self) -> Result<Vec<Job>, JobStoreError> {
        let mut jobs = Vec::new();
        let mut entries = match fs::read_dir(&self.jobs_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(jobs),
            Err(e) => return Err(JobStoreError::io(&self.jobs_dir, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| JobStoreError::io(&self.jobs_dir, e))?
        {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };

            match fs::read_to_string(&path).await {
                Ok(content) => match decode_record(&id, &content) {
                    Ok(job) => jobs.push(job),
                    Err(e) => warn!("Skipping job file {:?}: {}", path, e),
                },
                Err(e) => warn!("Failed to read job file {:?}: {}", path, e),
            }
        }

        debug!("Loaded {} jobs from {:?}", jobs.len(), self.jobs_dir);
        Ok(jobs)
    }

    async fn remove(&self, id: &str) -> Result<bool, JobStoreError> {
        let path = self.job_path(id);
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted job '{}' from {:?}", id, path);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(JobStoreError::io(&path, e)),
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
