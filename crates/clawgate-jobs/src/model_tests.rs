use super::*;
use chrono::TimeZone;
use serde_json::json;

fn sample_job() -> Job {
    let now = Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap();
    let defaults = JobDefaults {
        timezone: "UTC".into(),
        ..Default::default()
    };
    NewJob::new("Standup", "0 9 * * 1", Target::agent("main"), Payload::text("hello"))
        .into_job("job-abc".into(), &defaults, now)
}

#[test]
fn test_default_timezone_is_host_zone() {
    assert_eq!(JobDefaults::default().timezone, clawgate_schedule::host_timezone());
}

#[test]
fn test_one_time_next_run_in_non_utc_zone() {
    // 02:00 in New York; a one-time line compiled there fires 23 minutes later.
    let now = Utc.with_ymd_and_hms(2026, 10, 19, 6, 0, 0).unwrap();
    let defaults = JobDefaults {
        timezone: "America/New_York".into(),
        ..Default::default()
    };
    let job = NewJob::new("Ping", "23 2 19 10 *", Target::agent("main"), Payload::text("hi"))
        .into_job("job-ny".into(), &defaults, now);
    assert_eq!(
        job.schedule.next_run,
        Some(Utc.with_ymd_and_hms(2026, 10, 19, 6, 23, 0).unwrap())
    );
}

#[test]
fn test_new_job_takes_defaults() {
    let job = sample_job();
    assert_eq!(job.schedule.timezone, "UTC");
    assert_eq!(job.execution.timeout_ms, 120_000);
    assert!(job.execution.enabled);
    assert!(!job.execution.auto_delete);
    assert_eq!(job.state, JobState::default());
    assert_eq!(job.created_at, job.updated_at);
    assert_eq!(
        job.schedule.next_run,
        Some(Utc.with_ymd_and_hms(2026, 10, 26, 9, 0, 0).unwrap())
    );
}

#[test]
fn test_wire_shape() {
    let job = sample_job();
    let value = serde_json::to_value(&job).unwrap();

    assert_eq!(value["schedule"]["cronExpression"], "0 9 * * 1");
    assert_eq!(value["schedule"]["timezone"], "UTC");
    assert_eq!(value["target"], json!({"type": "agent", "agentId": "main"}));
    assert_eq!(value["payload"], json!({"type": "text", "content": "hello"}));
    assert_eq!(value["execution"]["timeoutMs"], 120_000);
    assert_eq!(value["execution"]["retryDelayMs"], 60_000);
    assert_eq!(value["state"]["runCount"], 0);
    assert_eq!(value["state"]["lastResult"], serde_json::Value::Null);
    assert!(value.get("createdAt").is_some());
}

#[test]
fn test_message_target_fields() {
    let target: Target = serde_json::from_value(json!({
        "type": "message",
        "channel": "telegram",
        "to": "@ops",
        "replyAccount": "ops-bot"
    }))
    .unwrap();

    assert_eq!(target.kind(), "message");
    assert_eq!(target.reply_account(), Some("ops-bot"));
    assert_eq!(target.agent_id(), None);
}

#[test]
fn test_unknown_payload_type_rejected() {
    let result: Result<Payload, _> =
        serde_json::from_value(json!({"type": "video", "content": "x"}));
    assert!(result.is_err());
}

#[test]
fn test_payload_summary_truncates() {
    let payload = Payload::text("line one\nline   two and a much longer tail");
    assert_eq!(payload.summary(100), "line one line two and a much longer tail");
    assert_eq!(payload.summary(12), "line one ...");

    let template = Payload::Template {
        template: "digest".into(),
        variables: BTreeMap::new(),
    };
    assert_eq!(template.summary(40), "template:digest");
}

#[test]
fn test_update_reschedules() {
    let mut job = sample_job();
    let later = Utc.with_ymd_and_hms(2026, 10, 20, 0, 0, 0).unwrap();
    let update = JobUpdate {
        cron_expression: Some("30 8 * * *".into()),
        ..Default::default()
    };
    update.apply(&mut job, later);

    assert_eq!(job.schedule.cron_expression, "30 8 * * *");
    assert_eq!(
        job.schedule.next_run,
        Some(Utc.with_ymd_and_hms(2026, 10, 20, 8, 30, 0).unwrap())
    );
    assert_eq!(job.updated_at, later);
    assert_eq!(job.id, "job-abc");
}

#[test]
fn test_update_clears_run_budget() {
    let mut job = sample_job();
    job.execution.max_runs = Some(4);
    job.execution.auto_delete = true;

    let now = job.updated_at;
    JobUpdate {
        name: Some("renamed".into()),
        ..Default::default()
    }
    .apply(&mut job, now);
    assert_eq!(job.execution.max_runs, Some(4));

    JobUpdate {
        max_runs: Some(None),
        auto_delete: Some(false),
        ..Default::default()
    }
    .apply(&mut job, now);
    assert_eq!(job.execution.max_runs, None);
    assert!(!job.execution.auto_delete);
}

#[test]
fn test_record_run_counts() {
    let at = Utc::now();
    let mut state = JobState::default();

    StateUpdate::record_run(&state, RunResult::Failure, Some("exit 1".into()), at)
        .apply(&mut state);
    StateUpdate::record_run(&state, RunResult::Success, None, at).apply(&mut state);
    StateUpdate::record_run(&state, RunResult::Failure, Some("exit 2".into()), at)
        .apply(&mut state);

    assert_eq!(state.run_count, 3);
    assert_eq!(state.fail_count, 2);
    assert_eq!(state.last_result, Some(RunResult::Failure));
    assert_eq!(state.last_error.as_deref(), Some("exit 2"));
}

#[test]
fn test_success_clears_last_error() {
    let mut state = JobState {
        last_error: Some("boom".into()),
        run_count: 1,
        fail_count: 1,
        ..Default::default()
    };
    StateUpdate::record_run(&state, RunResult::Success, None, Utc::now()).apply(&mut state);
    assert_eq!(state.last_error, None);
}

#[test]
fn test_counters_are_monotonic() {
    let mut state = JobState {
        run_count: 5,
        fail_count: 2,
        ..Default::default()
    };
    StateUpdate {
        run_count: Some(1),
        fail_count: Some(0),
        ..Default::default()
    }
    .apply(&mut state);

    assert_eq!(state.run_count, 5);
    assert_eq!(state.fail_count, 2);
}

#[test]
fn test_auto_delete_rules() {
    let mut job = sample_job();
    assert!(!job.should_auto_delete(RunResult::Success));

    job.execution.auto_delete = true;
    assert!(job.should_auto_delete(RunResult::Success));
    assert!(!job.should_auto_delete(RunResult::Failure));

    job.execution.auto_delete = false;
    job.execution.max_runs = Some(2);
    job.state.run_count = 1;
    assert!(!job.should_auto_delete(RunResult::Success));
    job.state.run_count = 2;
    // Failed runs count toward the budget too.
    assert!(job.should_auto_delete(RunResult::Failure));
}

#[test]
fn test_problems() {
    let mut job = sample_job();
    assert!(job.problems().is_empty());

    job.name = "  ".into();
    job.execution.timeout_ms = 10;
    job.schedule.cron_expression = "every day".into();
    job.execution.max_runs = Some(0);
    let problems = job.problems();
    assert_eq!(problems.len(), 4, "{problems:?}");
}
