//! Job records, the job store and per-job execution locks.
//!
//! Jobs are persisted one JSON file per id. The store is exposed through the
//! [`JobStore`] trait so an alternative backing can be swapped in without
//! touching callers; [`MemoryJobStore`] is the in-process implementation used
//! by tests.

mod error;
mod lock;
mod model;
mod store;

pub use error::{JobStoreError, LockError};
pub use lock::{ExecutionLock, LockGuard, LockInfo};
pub use model::{
    ExecutionSettings, Job, JobDefaults, JobState, JobUpdate, NewJob, Payload, RunResult,
    Schedule, StateUpdate, Target,
};
pub use store::{FileJobStore, JobStore, MemoryJobStore, sanitize_id};
