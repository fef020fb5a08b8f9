//! Subprocess runner with a two-stage timeout.
//!
//! Passing the primary timeout only starts a grace period; the child keeps
//! running. When the grace period also runs out the child's process group
//! gets SIGTERM, then SIGKILL after `kill_after`.

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::delivery::DeliveryCommand;

/// Bytes kept from each of stdout and stderr.
pub const OUTPUT_LIMIT: usize = 64 * 1024;

/// How long to wait for output pipes to close after the child exits.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    pub timeout: Duration,
    pub grace: Duration,
    pub kill_after: Duration,
}

/// How the child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Exited within the primary timeout.
    Completed,
    /// Exited on its own during the grace period.
    CompletedInGrace,
    /// Exited after SIGTERM.
    Terminated,
    /// Needed SIGKILL.
    Killed,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub phase: RunPhase,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl RunOutput {
    /// Zero exit without being signalled, even if the grace period was used.
    pub fn succeeded(&self) -> bool {
        matches!(self.phase, RunPhase::Completed | RunPhase::CompletedInGrace)
            && self.exit_code == Some(0)
    }

    pub fn timed_out(&self) -> bool {
        matches!(self.phase, RunPhase::Terminated | RunPhase::Killed)
    }

    pub fn exceeded_timeout(&self) -> bool {
        self.phase != RunPhase::Completed
    }
}

/// Run `command` to completion under `limits`. Only spawn failures are errors.
pub async fn run(command: &DeliveryCommand, limits: RunLimits) -> std::io::Result<RunOutput> {
    let started = Instant::now();

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Own process group so escalation reaches anything the program spawns.
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn()?;
    debug!("Spawned {} (pid {:?})", command.program, child.id());

    let stdout = child.stdout.take().map(|s| tokio::spawn(read_capped(s)));
    let stderr = child.stderr.take().map(|s| tokio::spawn(read_capped(s)));

    let (status, phase) = wait_with_escalation(&mut child, limits).await?;

    Ok(RunOutput {
        phase,
        exit_code: status.code(),
        stdout: collect(stdout).await,
        stderr: collect(stderr).await,
        duration: started.elapsed(),
    })
}

async fn wait_with_escalation(
    child: &mut Child,
    limits: RunLimits,
) -> std::io::Result<(ExitStatus, RunPhase)> {
    if let Ok(status) = timeout(limits.timeout, child.wait()).await {
        return Ok((status?, RunPhase::Completed));
    }
    warn!(
        "Delivery exceeded its {:?} timeout; allowing a {:?} grace period",
        limits.timeout, limits.grace
    );

    if let Ok(status) = timeout(limits.grace, child.wait()).await {
        return Ok((status?, RunPhase::CompletedInGrace));
    }
    warn!("Grace period expired; sending SIGTERM");
    signal_group(child, Termination::Graceful);

    if let Ok(status) = timeout(limits.kill_after, child.wait()).await {
        return Ok((status?, RunPhase::Terminated));
    }
    warn!("Delivery ignored SIGTERM for {:?}; sending SIGKILL", limits.kill_after);
    signal_group(child, Termination::Forced);
    if let Err(e) = child.start_kill() {
        debug!("start_kill after SIGKILL: {}", e);
    }

    Ok((child.wait().await?, RunPhase::Killed))
}

#[derive(Debug, Clone, Copy)]
enum Termination {
    Graceful,
    Forced,
}

#[cfg(unix)]
fn signal_group(child: &Child, how: Termination) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    let signal = match how {
        Termination::Graceful => Signal::SIGTERM,
        Termination::Forced => Signal::SIGKILL,
    };
    if let Err(e) = killpg(Pid::from_raw(pid), signal) {
        warn!("Failed to send {:?} to process group {}: {}", signal, pid, e);
    }
}

#[cfg(not(unix))]
fn signal_group(child: &mut Child, how: Termination) {
    if matches!(how, Termination::Forced) {
        let _ = child.start_kill();
    }
}

/// Read a stream to the end, keeping at most [`OUTPUT_LIMIT`] bytes.
async fn read_capped<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut kept = Vec::new();
    let mut buf = [0u8; 8192];
    let mut truncated = false;

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let room = OUTPUT_LIMIT.saturating_sub(kept.len());
                if n > room {
                    truncated = true;
                }
                kept.extend_from_slice(&buf[..n.min(room)]);
            }
            Err(e) => {
                debug!("Output stream closed with error: {}", e);
                break;
            }
        }
    }

    let mut text = String::from_utf8_lossy(&kept).into_owned();
    if truncated {
        text.push_str("\n[output truncated]");
    }
    text
}

async fn collect(handle: Option<JoinHandle<String>>) -> String {
    let Some(handle) = handle else {
        return String::new();
    };
    let abort = handle.abort_handle();
    match timeout(DRAIN_TIMEOUT, handle).await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            debug!("Output reader failed: {}", e);
            String::new()
        }
        Err(_) => {
            abort.abort();
            "[output unavailable: pipe held open by a background process]".to_string()
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
