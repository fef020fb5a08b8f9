//! Per-job execution log, one JSON object per line.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clawgate_jobs::sanitize_id;
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// How an execution was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Manual,
    Forced,
}

/// One execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub job_id: String,
    pub job_name: String,
    pub trigger: Trigger,
    /// Delivery command line, message elided.
    pub command: String,
    pub duration_ms: u64,
    /// `success`, `failure` or `timeout`.
    pub result: String,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub exceeded_timeout: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

/// `<logs_dir>/<job-id>.jsonl` files.
#[derive(Debug, Clone)]
pub struct ExecutionLog {
    logs_dir: PathBuf,
}

impl ExecutionLog {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
        }
    }

    pub fn path_for(&self, job_id: &str) -> PathBuf {
        self.logs_dir.join(format!("{}.jsonl", sanitize_id(job_id)))
    }

    pub async fn append(&self, entry: &LogEntry) -> std::io::Result<()> {
        fs::create_dir_all(&self.logs_dir).await?;
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let path = self.path_for(&entry.job_id);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!("Appended execution log entry to {:?}", path);
        Ok(())
    }

    /// Most recent entries, oldest first. `last = None` returns all of them.
    pub async fn read(&self, job_id: &str, last: Option<usize>) -> std::io::Result<Vec<LogEntry>> {
        let path = self.path_for(job_id);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut entries = parse_lines(&path, &content);
        if let Some(last) = last {
            let skip = entries.len().saturating_sub(last);
            entries.drain(..skip);
        }
        Ok(entries)
    }
}

fn parse_lines(path: &Path, content: &str) -> Vec<LogEntry> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(i, line)| match serde_json::from_str(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping bad log line {} in {:?}: {}", i + 1, path, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(job_id: &str, n: u64) -> LogEntry {
        LogEntry {
            timestamp: Utc::now(),
            job_id: job_id.to_string(),
            job_name: "test".to_string(),
            trigger: Trigger::Manual,
            command: "openclaw agent --agent main --message <message: 5 chars>".to_string(),
            duration_ms: n,
            result: "success".to_string(),
            exit_code: Some(0),
            exceeded_timeout: false,
            error: None,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    #[tokio::test]
    async fn test_append_and_read() {
        let dir = TempDir::new().unwrap();
        let log = ExecutionLog::new(dir.path().join("logs"));

        for n in 0..5 {
            log.append(&entry("job-a", n)).await.unwrap();
        }
        log.append(&entry("job-b", 99)).await.unwrap();

        let all = log.read("job-a", None).await.unwrap();
        assert_eq!(all.len(), 5);

        let last: Vec<_> = log
            .read("job-a", Some(2))
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.duration_ms)
            .collect();
        assert_eq!(last, vec![3, 4]);
    }

    #[tokio::test]
    async fn test_read_missing_log() {
        let dir = TempDir::new().unwrap();
        let log = ExecutionLog::new(dir.path());
        assert!(log.read("job-none", Some(10)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_lines_skipped() {
        let dir = TempDir::new().unwrap();
        let log = ExecutionLog::new(dir.path());
        log.append(&entry("job-a", 1)).await.unwrap();
        let mut content = std::fs::read_to_string(log.path_for("job-a")).unwrap();
        content.push_str("not json\n\n");
        std::fs::write(log.path_for("job-a"), content).unwrap();
        log.append(&entry("job-a", 2)).await.unwrap();

        assert_eq!(log.read("job-a", None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_job_id_stays_inside_logs_dir() {
        let dir = TempDir::new().unwrap();
        let logs_dir = dir.path().join("logs");
        let log = ExecutionLog::new(&logs_dir);
        let line = serde_json::to_string(&entry("../secret", 1)).unwrap();
        std::fs::write(dir.path().join("secret.jsonl"), line + "\n").unwrap();

        let path = log.path_for("../secret");
        assert_eq!(path.parent(), Some(logs_dir.as_path()));
        assert!(log.read("../secret", None).await.unwrap().is_empty());
    }

    #[test]
    fn test_wire_names() {
        let value = serde_json::to_value(entry("job-a", 7)).unwrap();
        assert_eq!(value["jobId"], "job-a");
        assert_eq!(value["durationMs"], 7);
        assert_eq!(value["trigger"], "manual");
        assert_eq!(value["exceededTimeout"], false);
    }
}
