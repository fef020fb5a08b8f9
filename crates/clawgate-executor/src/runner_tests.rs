use super::*;
use crate::test_support::sh_command;

fn limits(timeout_ms: u64, grace_ms: u64, kill_after_ms: u64) -> RunLimits {
    RunLimits {
        timeout: Duration::from_millis(timeout_ms),
        grace: Duration::from_millis(grace_ms),
        kill_after: Duration::from_millis(kill_after_ms),
    }
}

#[tokio::test]
async fn test_success_captures_output() {
    let cmd = sh_command(r#"echo "out $1 $2 $3"; echo err >&2"#);
    let output = run(&cmd, limits(5_000, 1_000, 500)).await.unwrap();

    assert_eq!(output.phase, RunPhase::Completed);
    assert_eq!(output.exit_code, Some(0));
    assert!(output.succeeded());
    assert!(!output.exceeded_timeout());
    assert_eq!(output.stdout.trim(), "out agent --agent main");
    assert_eq!(output.stderr.trim(), "err");
}

#[tokio::test]
async fn test_nonzero_exit_is_failure() {
    let output = run(&sh_command("exit 3"), limits(5_000, 1_000, 500))
        .await
        .unwrap();
    assert_eq!(output.phase, RunPhase::Completed);
    assert_eq!(output.exit_code, Some(3));
    assert!(!output.succeeded());
    assert!(!output.timed_out());
}

#[tokio::test]
async fn test_zero_exit_during_grace_is_success() {
    let output = run(&sh_command("sleep 0.5; exit 0"), limits(100, 5_000, 500))
        .await
        .unwrap();
    assert_eq!(output.phase, RunPhase::CompletedInGrace);
    assert!(output.exceeded_timeout());
    assert!(output.succeeded());
}

#[tokio::test]
async fn test_nonzero_exit_during_grace_is_failure() {
    let output = run(&sh_command("sleep 0.5; exit 1"), limits(100, 5_000, 500))
        .await
        .unwrap();
    assert_eq!(output.phase, RunPhase::CompletedInGrace);
    assert!(!output.succeeded());
}

#[tokio::test]
async fn test_hung_process_is_terminated() {
    let started = Instant::now();
    let output = run(&sh_command("sleep 30"), limits(100, 200, 2_000))
        .await
        .unwrap();

    assert_eq!(output.phase, RunPhase::Terminated);
    assert!(output.timed_out());
    assert!(!output.succeeded());
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_process_ignoring_sigterm_is_killed() {
    let started = Instant::now();
    let output = run(&sh_command("trap '' TERM; sleep 30"), limits(100, 100, 300))
        .await
        .unwrap();

    assert_eq!(output.phase, RunPhase::Killed);
    assert!(output.timed_out());
    assert_eq!(output.exit_code, None);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_spawn_failure_is_an_error() {
    let mut cmd = sh_command("exit 0");
    cmd.program = "/nonexistent/delivery-binary".to_string();
    assert!(run(&cmd, limits(1_000, 100, 100)).await.is_err());
}

#[tokio::test]
async fn test_output_is_truncated() {
    let cmd = sh_command("head -c 100000 /dev/zero | tr '\\0' 'a'");
    let output = run(&cmd, limits(5_000, 1_000, 500)).await.unwrap();

    assert!(output.succeeded());
    assert!(output.stdout.ends_with("[output truncated]"));
    assert!(output.stdout.len() <= OUTPUT_LIMIT + "\n[output truncated]".len());
}

#[tokio::test]
async fn test_gateway_env_reaches_child() {
    let mut cmd = sh_command(r#"printf '%s' "$OPENCLAW_GATEWAY_TOKEN""#);
    cmd.env
        .push(("OPENCLAW_GATEWAY_TOKEN".to_string(), "tok-123".to_string()));
    let output = run(&cmd, limits(5_000, 1_000, 500)).await.unwrap();
    assert_eq!(output.stdout, "tok-123");
}
