//! ClawGate - cron-driven message scheduler for autonomous agents.
//!
//! Main entry point for the `clawgate` CLI. Crontab lines invoke
//! `clawgate execute <job-id>`; everything else is job management.

mod cli;
mod cmd_cron;
mod cmd_execute;
mod cmd_jobs;
mod context;
mod exit;

#[cfg(test)]
mod test_support;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::cmd_jobs::EditRequest;
use crate::context::{AppContext, load_config};
use crate::exit::{CliResult, ErrorCode};

/// Initialize tracing with console (stderr) and daily-rotated file output
/// under `logs_dir`. Falls back to console only if the directory is unusable.
fn init_tracing(logs_dir: &Path, verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_appender = std::fs::create_dir_all(logs_dir)
        .map_err(|e| e.to_string())
        .and_then(|_| {
            RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("clawgate")
                .filename_suffix("log")
                .max_log_files(30)
                .build(logs_dir)
                .map_err(|e| e.to_string())
        });

    match file_appender {
        Ok(appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            // Flushes on drop; must outlive every log call.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(console)
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .init();
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(console)
                .init();
            tracing::warn!("File logging disabled ({}): {}", logs_dir.display(), e);
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.home.as_deref(), cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return e.code.into();
        }
    };
    init_tracing(&config.paths.logs_dir(), cli.verbose);

    match run(cli, config).await {
        Ok(code) => code.into(),
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {e}");
            e.code.into()
        }
    }
}

async fn run(cli: Cli, config: clawgate_config::Config) -> CliResult {
    if let Commands::Create(args) = &cli.command {
        if args.examples {
            cmd_jobs::print_examples();
            return Ok(ErrorCode::Success);
        }
    }

    let ctx = AppContext::new(config).await?;

    match cli.command {
        Commands::Create(args) => cmd_jobs::create(&ctx, args).await,
        Commands::List {
            json,
            agent,
            enabled,
        } => cmd_jobs::list(&ctx, json, agent.as_deref(), enabled).await,
        Commands::Show { job_id, json } => cmd_jobs::show(&ctx, &job_id, json).await,
        Commands::Execute {
            job_id,
            dry_run,
            force,
            vars,
        } => cmd_execute::execute(&ctx, &job_id, dry_run, force, &vars, cli.verbose).await,
        Commands::Edit {
            job_id,
            message,
            schedule,
            enabled,
            agent,
            name,
            timezone,
        } => {
            let request = EditRequest {
                message,
                schedule,
                enabled,
                agent,
                name,
                timezone,
            };
            cmd_jobs::edit(&ctx, &job_id, request).await
        }
        Commands::Delete { job_id, force } => cmd_jobs::delete(&ctx, &job_id, force).await,
        Commands::Cron(args) => cmd_cron::handle_cron_command(&ctx, args).await,
        Commands::Logs { job_id, last, json } => {
            cmd_execute::logs(&ctx, &job_id, last, json).await
        }
    }
}
