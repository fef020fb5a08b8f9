//! Shared fixtures for executor tests.

use chrono::Utc;
use clawgate_config::{DeliveryConfig, RoutingConfig};
use clawgate_jobs::{ExecutionSettings, Job, JobState, Payload, Schedule, Target};

use crate::delivery::{DeliveryBuilder, DeliveryCommand};

/// Delivery config that runs `script` under `sh -c`; the delivery arguments
/// become the script's positional parameters.
pub(crate) fn sh_delivery(script: &str) -> DeliveryConfig {
    DeliveryConfig {
        command: vec![
            "sh".to_string(),
            "-c".to_string(),
            script.to_string(),
            "delivery".to_string(),
        ],
        grace_period_ms: 2_000,
        kill_after_ms: 500,
        ..Default::default()
    }
}

pub(crate) fn sample_job(id: &str) -> Job {
    let now = Utc::now();
    Job {
        id: id.to_string(),
        name: format!("test {id}"),
        description: None,
        schedule: Schedule::new("0 9 * * *", "UTC"),
        target: Target::agent("main"),
        payload: Payload::text("hello from the scheduler"),
        execution: ExecutionSettings {
            enabled: true,
            timeout_ms: 5_000,
            max_retries: 0,
            retry_delay_ms: 0,
            auto_delete: false,
            max_runs: None,
        },
        state: JobState::default(),
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn sh_command(script: &str) -> DeliveryCommand {
    DeliveryBuilder::new(sh_delivery(script), RoutingConfig::default())
        .build(&sample_job("job-test"), "hello")
        .expect("sh delivery builds")
}
