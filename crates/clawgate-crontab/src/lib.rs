//! Crontab synchronization.
//!
//! ClawGate owns one region of the user's crontab, delimited by sentinel
//! comments. Trigger lines in that region carry only a job id; everything
//! outside the region is left exactly as found.

mod backend;
mod error;
mod sync;
mod table;

pub use backend::{CrontabBackend, FileCrontab, SystemCrontab};
pub use error::CrontabError;
pub use sync::CrontabSync;
pub use table::{CrontabEntry, CrontabTable, REGION_END, REGION_START};
