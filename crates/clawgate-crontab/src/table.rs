//! Parsing and rendering of the managed crontab region.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::error::CrontabError;

pub const REGION_START: &str = "# >>> ClawGate managed jobs (do not edit) >>>";
pub const REGION_END: &str = "# <<< ClawGate managed jobs <<<";
/// Start marker used when the text above it had no final newline; the newline
/// in front of it is ours and goes away with the region.
pub const REGION_START_JOINED: &str = "# >>> ClawGate managed jobs (do not edit, newline added) >>>";

static ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+\s+\S+\s+\S+\s+\S+\s+\S+)\s+.*\sexecute\s+([A-Za-z0-9_-]+)")
        .expect("entry pattern is valid")
});

static JOB_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("job id pattern is valid"));

/// One trigger line: when to fire, and which job to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrontabEntry {
    pub job_id: String,
    pub cron_expression: String,
}

impl CrontabEntry {
    /// Build an entry, rejecting ids or expressions that are unsafe in a crontab line.
    pub fn new(job_id: &str, cron_expression: &str) -> Result<Self, CrontabError> {
        if !JOB_ID.is_match(job_id) {
            return Err(CrontabError::InvalidEntry(format!(
                "job id '{job_id}' may only contain letters, digits, '-' and '_'"
            )));
        }
        clawgate_schedule::validate_cron(cron_expression)
            .map_err(|e| CrontabError::InvalidEntry(e.to_string()))?;

        Ok(Self {
            job_id: job_id.to_string(),
            cron_expression: cron_expression.split_whitespace().collect::<Vec<_>>().join(" "),
        })
    }

    fn parse(line: &str) -> Option<Self> {
        let caps = ENTRY.captures(line.trim())?;
        let cron_expression = caps[1].split_whitespace().collect::<Vec<_>>().join(" ");
        Some(Self {
            job_id: caps[2].to_string(),
            cron_expression,
        })
    }

    /// Render as a crontab line invoking `command execute <id>`.
    pub fn render(&self, command: &str, log_file: Option<&Path>) -> String {
        let mut line = format!(
            "{} {} execute {}",
            self.cron_expression,
            crontab_quote(command),
            self.job_id
        );
        if let Some(log) = log_file {
            line.push_str(&format!(" >> {} 2>&1", crontab_quote(&log.to_string_lossy())));
        }
        line
    }
}

/// A crontab split into unmanaged text around the managed entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrontabTable {
    before: String,
    entries: Vec<CrontabEntry>,
    after: String,
}

impl CrontabTable {
    pub fn parse(content: &str) -> Result<Self, CrontabError> {
        let mut offset = 0;
        let mut start: Option<usize> = None;
        let mut region: Option<(usize, usize)> = None;
        let mut joined = false;

        for line in content.split_inclusive('\n') {
            let line_start = offset;
            offset += line.len();
            let text = line.trim_end();

            if text == REGION_START || text == REGION_START_JOINED {
                if start.is_some() || region.is_some() {
                    return Err(CrontabError::MalformedRegion(
                        "more than one region start marker".to_string(),
                    ));
                }
                start = Some(line_start);
                joined = text == REGION_START_JOINED;
            } else if text == REGION_END {
                if let Some(s) = start.take() {
                    region = Some((s, offset));
                }
            }
        }

        if start.is_some() {
            return Err(CrontabError::MalformedRegion(
                "region start marker without an end marker".to_string(),
            ));
        }

        let Some((from, to)) = region else {
            return Ok(Self {
                before: content.to_string(),
                entries: Vec::new(),
                after: String::new(),
            });
        };

        let mut entries: Vec<CrontabEntry> = Vec::new();
        for line in content[from..to].lines() {
            let text = line.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            match CrontabEntry::parse(text) {
                Some(entry) => {
                    entries.retain(|e| e.job_id != entry.job_id);
                    entries.push(entry);
                }
                None => warn!("Dropping unrecognized line in managed crontab region: {}", text),
            }
        }

        let mut before = &content[..from];
        if joined {
            before = before.strip_suffix('\n').unwrap_or(before);
        }
        Ok(Self {
            before: before.to_string(),
            entries,
            after: content[to..].to_string(),
        })
    }

    pub fn entries(&self) -> &[CrontabEntry] {
        &self.entries
    }

    /// Insert or replace the entry for `entry.job_id`.
    pub fn upsert(&mut self, entry: CrontabEntry) {
        self.entries.retain(|e| e.job_id != entry.job_id);
        self.entries.push(entry);
    }

    pub fn remove(&mut self, job_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.job_id != job_id);
        self.entries.len() != before
    }

    pub fn replace_all(&mut self, entries: Vec<CrontabEntry>) {
        self.entries = entries;
    }

    /// Render the full table. An empty region is dropped entirely.
    pub fn render(&self, command: &str, log_file: Option<&Path>) -> String {
        let unterminated = !self.before.is_empty() && !self.before.ends_with('\n');
        if self.entries.is_empty() {
            let separator = if unterminated && !self.after.is_empty() { "\n" } else { "" };
            return format!("{}{}{}", self.before, separator, self.after);
        }

        let mut out = self.before.clone();
        if unterminated {
            out.push('\n');
        }
        out.push_str(&self.region(command, log_file, unterminated));
        out.push_str(&self.after);
        out
    }

    /// The managed region on its own, markers included.
    pub fn render_region(&self, command: &str, log_file: Option<&Path>) -> String {
        self.region(command, log_file, false)
    }

    fn region(&self, command: &str, log_file: Option<&Path>, joined: bool) -> String {
        let mut out = String::new();
        out.push_str(if joined { REGION_START_JOINED } else { REGION_START });
        out.push('\n');
        for entry in &self.entries {
            out.push_str(&entry.render(command, log_file));
            out.push('\n');
        }
        out.push_str(REGION_END);
        out.push('\n');
        out
    }
}

/// Quote for `/bin/sh` and escape `%`, which cron treats as a newline.
fn crontab_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-=:+@,".contains(c));
    let quoted = if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    };
    quoted.replace('%', r"\%")
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
