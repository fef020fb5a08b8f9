//! # ClawGate Schedule
//!
//! Compiles human-readable schedules ("9am every Monday", "every 15 minutes",
//! "next friday at 10am 2x") and raw five-field cron strings into a
//! normalized cron expression plus run-count metadata.
//!
//! ```rust
//! use clawgate_schedule::compile;
//!
//! let schedule = compile("9am every monday").unwrap();
//! assert_eq!(schedule.cron_expression, "0 9 * * 1");
//! ```
//!
//! Relative forms (`in 20 minutes`, `at 5pm today`, `next friday`) read the
//! local clock; use [`compile_at`] to pin "now".

mod compiler;
mod cron_expr;
mod error;
mod examples;
mod tokens;

pub use compiler::{CompiledSchedule, compile, compile_at};
pub use cron_expr::{host_timezone, next_run, parse_timezone, validate_cron};
pub use error::ScheduleError;
pub use examples::{EXAMPLES, Example};
