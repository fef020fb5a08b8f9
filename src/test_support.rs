//! Command-handler fixtures: a state directory in a temp dir, the file
//! crontab backend and an `sh -c` delivery command.

use tempfile::TempDir;

use clawgate_config::{Config, CrontabBackendKind};
use clawgate_jobs::{JobStore, NewJob, Payload, Target};

use crate::context::AppContext;

pub(crate) async fn test_context() -> (TempDir, AppContext) {
    test_context_with("exit 0").await
}

pub(crate) async fn test_context_with(script: &str) -> (TempDir, AppContext) {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default().with_state_dir(dir.path());
    config.crontab.backend = CrontabBackendKind::File;
    config.crontab.file = Some(dir.path().join("crontab"));
    config.crontab.command = Some("/usr/local/bin/clawgate".into());
    config.delivery.command = vec![
        "sh".to_string(),
        "-c".to_string(),
        script.to_string(),
        "delivery".to_string(),
    ];
    config.delivery.grace_period_ms = 1_000;
    config.delivery.kill_after_ms = 500;

    let ctx = AppContext::new(config).await.unwrap();
    (dir, ctx)
}

/// Store a job directly, bypassing the crontab. Returns its id.
pub(crate) async fn save_job(ctx: &AppContext, enabled: bool) -> String {
    let input = NewJob::new(
        "fixture",
        "0 9 * * *",
        Target::agent("main"),
        Payload::text("hello"),
    )
    .with_enabled(enabled);
    ctx.store.create(input).await.unwrap().id
}
