//! `execute` and `logs`.

use tracing::debug;

use clawgate_executor::{ExecuteOptions, ExecutionReport, LogEntry, Outcome};
use clawgate_jobs::JobStore;

use crate::cli::parse_vars;
use crate::context::AppContext;
use crate::exit::{CliError, CliResult, ErrorCode};

pub(crate) async fn execute(
    ctx: &AppContext,
    job_id: &str,
    dry_run: bool,
    force: bool,
    vars: &[String],
    verbose: bool,
) -> CliResult {
    let options = ExecuteOptions {
        dry_run,
        force,
        variables: parse_vars(vars)
            .map_err(CliError::validation)?
            .into_iter()
            .collect(),
    };

    let report = ctx.executor().execute(job_id, &options).await?;
    debug!("Execution report: {:?}", report.outcome);
    print_report(&report, verbose);
    Ok(ErrorCode::for_outcome(&report.outcome))
}

fn print_report(report: &ExecutionReport, verbose: bool) {
    let label = format!("{} ({})", report.job_name, report.job_id);
    match &report.outcome {
        Outcome::DryRun => {
            println!("Dry run for {label}");
            if let Some(command) = &report.command {
                println!("Command: {command}");
            }
            if let Some(message) = &report.message {
                println!("Message:\n{message}");
            }
            return;
        }
        Outcome::Success => println!("Delivered {label} in {} ms", report.duration.as_millis()),
        Outcome::Disabled => eprintln!("Job {label} is disabled (use --force to run it anyway)"),
        Outcome::AlreadyRunning { pid } => match pid {
            Some(pid) => eprintln!("Job {label} is already running (pid {pid})"),
            None => eprintln!("Job {label} is already running"),
        },
        Outcome::PayloadError(e) => eprintln!("Job {label}: payload error: {e}"),
        Outcome::SpawnFailed(e) => eprintln!("Job {label}: could not start delivery: {e}"),
        Outcome::Failed { exit_code } => match exit_code {
            Some(code) => eprintln!("Job {label}: delivery failed with exit code {code}"),
            None => eprintln!("Job {label}: delivery was killed by a signal"),
        },
        Outcome::TimedOut => eprintln!("Job {label}: delivery timed out and was terminated"),
    }

    if verbose {
        if let Some(command) = &report.command {
            println!("Command: {command}");
        }
        if !report.stdout.trim().is_empty() {
            println!("--- stdout ---\n{}", report.stdout.trim_end());
        }
        if !report.stderr.trim().is_empty() {
            println!("--- stderr ---\n{}", report.stderr.trim_end());
        }
    }

    if report.auto_deleted {
        println!("Job {label} finished its run budget and was deleted");
    } else if let Some(job) = &report.job {
        if let Some(max) = job.execution.max_runs {
            println!("Run {} of {}", job.state.run_count, max);
        }
    }
}

pub(crate) async fn logs(ctx: &AppContext, job_id: &str, last: usize, json: bool) -> CliResult {
    let executor = ctx.executor();
    let entries = executor.log().read(job_id, Some(last)).await?;

    // A deleted job can still have history; only complain when there is neither.
    if entries.is_empty() {
        if ctx.store.get(job_id).await?.is_none() {
            return Err(CliError::not_found(job_id));
        }
        if !json {
            println!("No executions recorded for {job_id}.");
        }
        return Ok(ErrorCode::Success);
    }

    for entry in &entries {
        if json {
            println!("{}", serde_json::to_string(entry)?);
        } else {
            println!("{}", format_entry(entry));
        }
    }
    Ok(ErrorCode::Success)
}

fn format_entry(entry: &LogEntry) -> String {
    let mut line = format!(
        "{}  {:<8} {:>7} ms  exit={}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        entry.result,
        entry.duration_ms,
        entry
            .exit_code
            .map_or_else(|| "-".to_string(), |c| c.to_string()),
    );
    if entry.exceeded_timeout {
        line.push_str("  (grace period)");
    }
    if let Some(error) = &entry.error {
        line.push_str(&format!("\n    {error}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{save_job, test_context_with};

    #[tokio::test]
    async fn test_execute_maps_outcomes_to_exit_codes() {
        let (_dir, ctx) = test_context_with("exit 3").await;
        let id = save_job(&ctx, true).await;

        let code = execute(&ctx, &id, false, false, &[], false).await.unwrap();
        assert_eq!(code, ErrorCode::ExecutionFailed);

        let (_dir, ctx) = test_context_with("exit 0").await;
        let id = save_job(&ctx, false).await;
        let code = execute(&ctx, &id, false, false, &[], false).await.unwrap();
        assert_eq!(code, ErrorCode::JobDisabled);
        let code = execute(&ctx, &id, false, true, &[], false).await.unwrap();
        assert_eq!(code, ErrorCode::Success);
    }

    #[tokio::test]
    async fn test_execute_unknown_job() {
        let (_dir, ctx) = test_context_with("exit 0").await;
        let err = execute(&ctx, "job-nope", false, false, &[], false)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::JobNotFound);
    }

    #[tokio::test]
    async fn test_execute_rejects_bad_var() {
        let (_dir, ctx) = test_context_with("exit 0").await;
        let id = save_job(&ctx, true).await;
        let err = execute(&ctx, &id, true, false, &["oops".to_string()], false)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_logs_after_execution() {
        let (_dir, ctx) = test_context_with("exit 0").await;
        let id = save_job(&ctx, true).await;

        assert_eq!(logs(&ctx, &id, 5, false).await.unwrap(), ErrorCode::Success);
        execute(&ctx, &id, false, false, &[], false).await.unwrap();
        assert_eq!(logs(&ctx, &id, 5, true).await.unwrap(), ErrorCode::Success);

        let err = logs(&ctx, "job-nope", 5, false).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::JobNotFound);
    }
}
