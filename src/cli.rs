//! CLI definitions for ClawGate.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

/// ClawGate CLI.
#[derive(Parser)]
#[command(name = "clawgate")]
#[command(about = "Schedule messages to agents without exposing them to the host scheduler")]
#[command(version)]
pub(crate) struct Cli {
    /// State directory root
    #[arg(long, env = "CLAWGATE_HOME", global = true)]
    pub home: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, env = "CLAWGATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Create a scheduled job
    Create(CreateArgs),

    /// List jobs
    List {
        /// Print job records as JSON
        #[arg(long)]
        json: bool,

        /// Only jobs for this agent
        #[arg(long)]
        agent: Option<String>,

        /// Only enabled jobs
        #[arg(long)]
        enabled: bool,
    },

    /// Show one job
    Show {
        job_id: String,

        /// Print the job record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a job now (this is what crontab invokes)
    Execute {
        job_id: String,

        /// Print the delivery command without running it
        #[arg(long)]
        dry_run: bool,

        /// Run even if the job is disabled
        #[arg(long)]
        force: bool,

        /// Payload variable override, KEY=VALUE (repeatable)
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,
    },

    /// Change a job
    Edit {
        job_id: String,

        /// New message text
        #[arg(long)]
        message: Option<String>,

        /// New schedule expression
        #[arg(long)]
        schedule: Option<String>,

        /// Enable or disable the job
        #[arg(long)]
        enabled: Option<bool>,

        /// Deliver to another agent
        #[arg(long)]
        agent: Option<String>,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New timezone
        #[arg(long)]
        timezone: Option<String>,
    },

    /// Delete a job and its crontab entry
    Delete {
        job_id: String,

        /// Required; deletion cannot be undone
        #[arg(long)]
        force: bool,
    },

    /// Inspect or rebuild the managed crontab region
    Cron(CronArgs),

    /// Show a job's execution log
    Logs {
        job_id: String,

        /// Number of most recent entries
        #[arg(long, default_value_t = 10)]
        last: usize,

        /// Print entries as JSON lines
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("payload")
        .args(["message", "file", "template"])
        .multiple(false)
))]
pub(crate) struct CreateArgs {
    /// Job name
    #[arg(long, required_unless_present = "examples")]
    pub name: Option<String>,

    /// Schedule: natural language ("every monday at 9am") or a cron expression
    #[arg(long, required_unless_present = "examples")]
    pub schedule: Option<String>,

    /// Agent that receives the message (default from config)
    #[arg(long)]
    pub agent: Option<String>,

    /// Message text
    #[arg(long)]
    pub message: Option<String>,

    /// Read the message from a file at execution time
    #[arg(long)]
    pub file: Option<String>,

    /// Use a named template from the templates directory
    #[arg(long)]
    pub template: Option<String>,

    /// Payload variable, KEY=VALUE (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Channel the agent should reply on
    #[arg(long)]
    pub channel: Option<String>,

    /// Recipient on the channel
    #[arg(long)]
    pub to: Option<String>,

    /// IANA timezone for the schedule
    #[arg(long)]
    pub timezone: Option<String>,

    /// Delete the job after its first successful run
    #[arg(long)]
    pub auto_delete: bool,

    /// Create the job disabled
    #[arg(long)]
    pub disabled: bool,

    /// Show what would be created without saving
    #[arg(long)]
    pub dry_run: bool,

    /// Print example schedule expressions and exit
    #[arg(long)]
    pub examples: bool,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("action")
        .args(["show", "install", "uninstall"])
        .required(true)
))]
pub(crate) struct CronArgs {
    /// Print the managed region
    #[arg(long)]
    pub show: bool,

    /// Rebuild the managed region from the job store
    #[arg(long)]
    pub install: bool,

    /// Remove every managed entry
    #[arg(long)]
    pub uninstall: bool,
}

/// Split repeated `KEY=VALUE` arguments.
pub(crate) fn parse_vars(vars: &[String]) -> Result<Vec<(String, String)>, String> {
    vars.iter()
        .map(|raw| match raw.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(format!("Invalid variable '{raw}', expected KEY=VALUE")),
        })
        .collect()
}
