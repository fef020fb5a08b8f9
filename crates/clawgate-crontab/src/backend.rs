//! Where the crontab lives.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::CrontabError;

/// Read and replace a whole crontab.
pub trait CrontabBackend: Send + Sync {
    fn read(&self) -> Result<String, CrontabError>;

    fn write(&self, content: &str) -> Result<(), CrontabError>;

    /// Short label for log lines and `cron --show`.
    fn describe(&self) -> String;
}

/// The invoking user's crontab, through the `crontab` program.
#[derive(Debug, Clone)]
pub struct SystemCrontab {
    program: String,
}

impl SystemCrontab {
    pub fn new() -> Self {
        Self {
            program: "crontab".to_string(),
        }
    }

    /// Use a different `crontab` executable.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SystemCrontab {
    fn default() -> Self {
        Self::new()
    }
}

impl CrontabBackend for SystemCrontab {
    fn read(&self) -> Result<String, CrontabError> {
        let output = Command::new(&self.program)
            .arg("-l")
            .output()
            .map_err(|e| CrontabError::Command(format!("Failed to execute {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // A user without a crontab is an empty table.
            if stderr.to_lowercase().contains("no crontab") {
                return Ok(String::new());
            }
            return Err(CrontabError::Command(format!(
                "{} -l failed: {}",
                self.program,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn write(&self, content: &str) -> Result<(), CrontabError> {
        let mut child = Command::new(&self.program)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CrontabError::Command(format!("Failed to execute {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(content.as_bytes())
                .map_err(|e| CrontabError::Command(format!("Failed to write crontab: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| CrontabError::Command(format!("Failed to wait for {}: {}", self.program, e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CrontabError::Command(format!(
                "{} - rejected the table: {}",
                self.program,
                stderr.trim()
            )));
        }

        debug!("Installed crontab via {}", self.program);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("user crontab ({})", self.program)
    }
}

/// A crontab kept in a plain file, for hosts managed by other tooling.
#[derive(Debug, Clone)]
pub struct FileCrontab {
    path: PathBuf,
}

impl FileCrontab {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CrontabBackend for FileCrontab {
    fn read(&self) -> Result<String, CrontabError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(CrontabError::io(&self.path, e)),
        }
    }

    fn write(&self, content: &str) -> Result<(), CrontabError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| CrontabError::io(parent, e))?;
        }

        let staging = self.path.with_extension("clawgate.tmp");
        fs::write(&staging, content).map_err(|e| CrontabError::io(&staging, e))?;
        fs::rename(&staging, &self.path).map_err(|e| CrontabError::io(&self.path, e))?;

        debug!("Wrote crontab file {:?}", self.path);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("crontab file {}", self.path.display())
    }
}
