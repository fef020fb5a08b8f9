//! Job execution.
//!
//! An [`Executor`] takes one job through a single attempt: enablement check,
//! per-job lock, payload resolution, delivery under a two-stage timeout, the
//! execution log and the state update, and finally auto-deletion when the
//! job's run budget is spent.

mod delivery;
mod error;
mod executor;
mod log;
mod payload;
mod runner;

#[cfg(test)]
mod test_support;

pub use delivery::{DeliveryBuilder, DeliveryCommand, GATEWAY_TOKEN_ENV, GATEWAY_URL_ENV};
pub use error::{ExecutorError, PayloadError};
pub use executor::{ExecuteOptions, ExecutionReport, Executor, Outcome};
pub use log::{ExecutionLog, LogEntry, Trigger};
pub use payload::{PayloadResolver, substitute};
pub use runner::{OUTPUT_LIMIT, RunLimits, RunOutput, RunPhase, run};
