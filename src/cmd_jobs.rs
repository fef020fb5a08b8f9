//! Job management commands: create, list, show, edit, delete.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use clawgate_jobs::{Job, JobStore, JobUpdate, NewJob, Payload, Target};
use clawgate_schedule::{
    CompiledSchedule, EXAMPLES, ScheduleError, compile, host_timezone, parse_timezone,
};

use crate::cli::{CreateArgs, parse_vars};
use crate::context::AppContext;
use crate::exit::{CliError, CliResult, ErrorCode};

/// Print the supported schedule grammar.
pub(crate) fn print_examples() {
    println!("Schedule examples:");
    for example in EXAMPLES {
        println!("  {:<32} {}", example.expression, example.summary);
    }
}

/// Compile `expression`, turning a failure into a validation error with suggestions.
fn compile_schedule(expression: &str) -> CliResult<CompiledSchedule> {
    compile(expression).map_err(|e: ScheduleError| {
        eprintln!("{e}\n");
        print_examples_to_stderr();
        CliError::validation(format!("Invalid schedule '{expression}'"))
    })
}

/// Validate `tz` and flag zones the crontab daemon will not fire in.
fn check_timezone(tz: &str) -> CliResult<()> {
    parse_timezone(tz)?;
    let host = host_timezone();
    if tz != host {
        warn!("Timezone '{}' differs from the host zone '{}'", tz, host);
        eprintln!("Warning: crontab fires in host time ({host}); next run is computed in {tz}");
    }
    Ok(())
}

fn print_examples_to_stderr() {
    eprintln!("Try one of:");
    for example in EXAMPLES.iter().take(8) {
        eprintln!("  {}", example.expression);
    }
    eprintln!("Run `clawgate create --examples` for the full list.");
}

pub(crate) async fn create(ctx: &AppContext, args: CreateArgs) -> CliResult {
    let name = args
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| CliError::validation("--name is required"))?;
    let expression = args
        .schedule
        .ok_or_else(|| CliError::validation("--schedule is required"))?;
    let compiled = compile_schedule(&expression)?;

    if let Some(tz) = &args.timezone {
        check_timezone(tz)?;
    }

    let variables: BTreeMap<String, String> =
        parse_vars(&args.vars).map_err(CliError::validation)?.into_iter().collect();
    let payload = match (args.message, args.file, args.template) {
        (Some(content), _, _) => Payload::Text { content, variables },
        (_, Some(path), _) => Payload::File { path, variables },
        (_, _, Some(template)) => Payload::Template { template, variables },
        _ => {
            return Err(CliError::validation(
                "One of --message, --file or --template is required",
            ));
        }
    };

    let target = Target::Agent {
        agent_id: args
            .agent
            .unwrap_or_else(|| ctx.config.defaults.agent.clone()),
        channel: args.channel.or_else(|| ctx.config.defaults.channel.clone()),
        to: args.to,
        reply_account: None,
    };

    let mut input = NewJob::new(name, compiled.cron_expression.clone(), target, payload)
        .with_auto_delete(args.auto_delete || compiled.is_one_time)
        .with_enabled(!args.disabled);
    input.description = Some(compiled.description.clone());
    input.timezone = args.timezone;
    if let Some(max_runs) = compiled.max_runs {
        input = input.with_max_runs(max_runs);
    }

    if args.dry_run {
        print_preview(&input, &compiled);
        return Ok(ErrorCode::Success);
    }

    let job = ctx.store.create(input).await?;
    if job.execution.enabled {
        if let Err(e) = ctx.crontab.add(&job.id, &job.schedule.cron_expression) {
            // An enabled job is never left without its trigger.
            if let Err(rollback) = ctx.store.delete(&job.id).await {
                warn!("Failed to roll back job '{}': {}", job.id, rollback);
            }
            return Err(e.into());
        }
    }

    info!("Created job '{}' ({})", job.name, job.id);
    println!("Created job {}", job.id);
    println!("  Name:     {}", job.name);
    println!("  Schedule: {} ({})", compiled.description, compiled.cron_expression);
    println!("  Next run: {}", format_time(job.schedule.next_run));
    if let Some(max_runs) = job.execution.max_runs {
        println!("  Runs:     deleted after {max_runs} run(s)");
    } else if job.execution.auto_delete {
        println!("  Runs:     deleted after the first successful run");
    }
    if !job.execution.enabled {
        println!("  Disabled: no crontab entry installed");
    }
    Ok(ErrorCode::Success)
}

fn print_preview(input: &NewJob, compiled: &CompiledSchedule) {
    println!("Dry run: nothing saved");
    println!("  Name:     {}", input.name);
    println!("  Schedule: {} ({})", compiled.description, compiled.cron_expression);
    println!("  Target:   {}", describe_target(&input.target));
    println!("  Payload:  {}", input.payload.summary(60));
    if let Some(max_runs) = input.max_runs {
        println!("  Max runs: {max_runs}");
    }
    println!("  Auto-delete: {}", input.auto_delete);
    println!("  Enabled:  {}", input.enabled.unwrap_or(true));
}

pub(crate) async fn list(
    ctx: &AppContext,
    json: bool,
    agent: Option<&str>,
    enabled_only: bool,
) -> CliResult {
    let jobs: Vec<Job> = ctx
        .store
        .list()
        .await?
        .into_iter()
        .filter(|job| agent.is_none_or(|a| job.target.agent_id() == Some(a)))
        .filter(|job| !enabled_only || job.execution.enabled)
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(ErrorCode::Success);
    }

    if jobs.is_empty() {
        println!("No jobs found.");
        return Ok(ErrorCode::Success);
    }

    println!(
        "{:<18} {:<24} {:<16} {:<18} {:<4} {}",
        "ID", "NAME", "CRON", "NEXT RUN", "ON", "RUNS"
    );
    println!("{}", "-".repeat(90));
    for job in jobs {
        let runs = match job.execution.max_runs {
            Some(max) => format!("{}/{}", job.state.run_count, max),
            None => job.state.run_count.to_string(),
        };
        println!(
            "{:<18} {:<24} {:<16} {:<18} {:<4} {}",
            job.id,
            truncate(&job.name, 24),
            job.schedule.cron_expression,
            format_time(job.schedule.next_run),
            if job.execution.enabled { "yes" } else { "no" },
            runs
        );
    }
    Ok(ErrorCode::Success)
}

pub(crate) async fn show(ctx: &AppContext, job_id: &str, json: bool) -> CliResult {
    let job = ctx
        .store
        .get(job_id)
        .await?
        .ok_or_else(|| CliError::not_found(job_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(ErrorCode::Success);
    }

    let lock = ctx.executor().lock().get_lock_info(&job.id)?;

    println!("Job: {}", job.name);
    println!("{}", "=".repeat(50));
    println!("ID:          {}", job.id);
    if let Some(description) = &job.description {
        println!("Schedule:    {description}");
    }
    println!("Cron:        {}", job.schedule.cron_expression);
    println!("Timezone:    {}", job.schedule.timezone);
    println!("Next run:    {}", format_time(job.schedule.next_run));
    println!("Target:      {}", describe_target(&job.target));
    println!("Payload:     {}", job.payload.summary(60));
    for (key, value) in job.payload.variables() {
        println!("  {{{{{key}}}}} = {value}");
    }

    println!("\nExecution:");
    println!("  Enabled:     {}", job.execution.enabled);
    println!("  Timeout:     {} ms", job.execution.timeout_ms);
    println!(
        "  Retries:     {} (delay {} ms, not retried automatically)",
        job.execution.max_retries, job.execution.retry_delay_ms
    );
    println!("  Auto-delete: {}", job.execution.auto_delete);
    if let Some(max_runs) = job.execution.max_runs {
        println!("  Max runs:    {max_runs}");
    }

    println!("\nState:");
    println!("  Runs:        {} ({} failed)", job.state.run_count, job.state.fail_count);
    println!("  Last run:    {}", format_time(job.state.last_run));
    if let Some(result) = job.state.last_result {
        println!("  Last result: {}", result.as_str());
    }
    if let Some(error) = &job.state.last_error {
        println!("  Last error:  {error}");
    }
    match lock {
        Some(info) => println!(
            "  Running:     yes (pid {}, since {})",
            info.pid,
            info.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => println!("  Running:     no"),
    }

    println!("\nCreated: {}", job.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Updated: {}", job.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    Ok(ErrorCode::Success)
}

/// Changes requested by `edit`.
#[derive(Debug, Default)]
pub(crate) struct EditRequest {
    pub message: Option<String>,
    pub schedule: Option<String>,
    pub enabled: Option<bool>,
    pub agent: Option<String>,
    pub name: Option<String>,
    pub timezone: Option<String>,
}

pub(crate) async fn edit(ctx: &AppContext, job_id: &str, request: EditRequest) -> CliResult {
    let job = ctx
        .store
        .get(job_id)
        .await?
        .ok_or_else(|| CliError::not_found(job_id))?;

    let mut update = JobUpdate {
        name: request.name,
        enabled: request.enabled,
        ..Default::default()
    };

    if let Some(content) = request.message {
        update.payload = Some(Payload::Text {
            content,
            variables: job.payload.variables().clone(),
        });
    }
    if let Some(expression) = request.schedule {
        let compiled = compile_schedule(&expression)?;
        update.cron_expression = Some(compiled.cron_expression);
        update.description = Some(compiled.description);
        // A new schedule brings its own run budget.
        update.max_runs = Some(compiled.max_runs);
        update.auto_delete = Some(compiled.is_one_time);
    }
    if let Some(tz) = request.timezone {
        check_timezone(&tz)?;
        update.timezone = Some(tz);
    }
    if let Some(agent) = request.agent {
        update.target = Some(retarget(&job.target, agent));
    }

    if update.is_empty() {
        return Err(CliError::validation("Nothing to change"));
    }

    let updated = ctx
        .store
        .update(job_id, update)
        .await?
        .ok_or_else(|| CliError::not_found(job_id))?;

    if updated.execution.enabled {
        ctx.crontab
            .add(&updated.id, &updated.schedule.cron_expression)?;
    } else {
        ctx.crontab.remove(&updated.id)?;
    }

    info!("Updated job '{}'", updated.id);
    println!("Updated job {}", updated.id);
    println!(
        "  Schedule: {} ({})",
        updated.description.as_deref().unwrap_or("custom"),
        updated.schedule.cron_expression
    );
    println!("  Enabled:  {}", updated.execution.enabled);
    println!("  Next run: {}", format_time(updated.schedule.next_run));
    Ok(ErrorCode::Success)
}

fn retarget(target: &Target, agent: String) -> Target {
    let mut target = target.clone();
    match &mut target {
        Target::Agent { agent_id, .. } => *agent_id = agent,
        Target::Message { agent_id, .. } => *agent_id = Some(agent),
    }
    target
}

pub(crate) async fn delete(ctx: &AppContext, job_id: &str, force: bool) -> CliResult {
    let job = ctx
        .store
        .get(job_id)
        .await?
        .ok_or_else(|| CliError::not_found(job_id))?;

    if !force {
        return Err(CliError::validation(format!(
            "Refusing to delete '{}' ({}) without --force",
            job.name, job.id
        )));
    }

    // Trigger first so the crontab never points at a missing record.
    ctx.crontab.remove(&job.id)?;
    ctx.store.delete(&job.id).await?;

    info!("Deleted job '{}'", job.id);
    println!("Deleted job {} ({})", job.id, job.name);
    Ok(ErrorCode::Success)
}

pub(crate) fn describe_target(target: &Target) -> String {
    match target {
        Target::Agent {
            agent_id,
            channel,
            to,
            reply_account,
        } => {
            let mut out = format!("agent {agent_id}");
            if let Some(channel) = channel {
                out.push_str(&format!(" via {channel}"));
            }
            if let Some(to) = to {
                out.push_str(&format!(" to {to}"));
            }
            if let Some(account) = reply_account {
                out.push_str(&format!(" (reply account {account})"));
            }
            out
        }
        Target::Message { channel, to, .. } => format!("message {to} on {channel}"),
    }
}

pub(crate) fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let cut: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
#[path = "cmd_jobs_tests.rs"]
mod tests;
