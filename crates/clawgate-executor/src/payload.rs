//! Payload resolution and `{{variable}}` substitution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Local};
use clawgate_jobs::Payload;
use regex::{Captures, Regex};
use tracing::debug;

use crate::error::PayloadError;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.-]+)\s*\}\}").expect("placeholder pattern is valid")
});

/// Extensions tried, in order, for a template named without one.
const TEMPLATE_EXTENSIONS: [&str; 2] = ["md", "txt"];

/// Turns a job payload into the message text that gets delivered.
#[derive(Debug, Clone)]
pub struct PayloadResolver {
    templates_dir: PathBuf,
}

impl PayloadResolver {
    pub fn new(templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates_dir: templates_dir.into(),
        }
    }

    /// Resolve `payload` and substitute placeholders.
    ///
    /// Lookup order is `overrides`, then the payload's own variables, then
    /// the built-ins (`date`, `time`, `datetime`, `timestamp`, `weekday`).
    /// Unknown placeholders are left as written.
    pub fn resolve(
        &self,
        payload: &Payload,
        overrides: &BTreeMap<String, String>,
        now: DateTime<Local>,
    ) -> Result<String, PayloadError> {
        let raw = match payload {
            Payload::Text { content, .. } => content.clone(),
            Payload::File { path, .. } => read(&self.file_path(path))?,
            Payload::Template { template, .. } => read(&self.template_path(template)?)?,
        };

        let builtins = builtins(now);
        let message = substitute(&raw, &[overrides, payload.variables(), &builtins]);
        if message.trim().is_empty() {
            return Err(PayloadError::Empty);
        }
        Ok(message)
    }

    fn file_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.templates_dir.join(path)
        }
    }

    fn template_path(&self, name: &str) -> Result<PathBuf, PayloadError> {
        let exact = self.templates_dir.join(name);
        if Path::new(name).extension().is_none() {
            for ext in TEMPLATE_EXTENSIONS {
                let candidate = exact.with_extension(ext);
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }
        if exact.is_file() {
            Ok(exact)
        } else {
            Err(PayloadError::NotFound(exact))
        }
    }
}

fn read(path: &Path) -> Result<String, PayloadError> {
    debug!("Reading payload from {:?}", path);
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PayloadError::NotFound(path.to_path_buf()),
        _ => PayloadError::Read {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

fn builtins(now: DateTime<Local>) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("date".to_string(), now.format("%Y-%m-%d").to_string()),
        ("time".to_string(), now.format("%H:%M").to_string()),
        ("datetime".to_string(), now.format("%Y-%m-%d %H:%M").to_string()),
        ("timestamp".to_string(), now.to_rfc3339()),
        ("weekday".to_string(), now.format("%A").to_string()),
    ])
}

/// Replace `{{name}}` with the first layer that defines `name`.
pub fn substitute(text: &str, layers: &[&BTreeMap<String, String>]) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| {
            layers
                .iter()
                .find_map(|layer| layer.get(&caps[1]))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 19, 9, 5, 0).unwrap()
    }

    #[test]
    fn test_substitute_priority() {
        let overrides = vars(&[("who", "override")]);
        let job = vars(&[("who", "job"), ("what", "report")]);
        let builtin = vars(&[("who", "builtin"), ("what", "x"), ("date", "today")]);

        let out = substitute(
            "{{who}} sends {{ what }} on {{date}}",
            &[&overrides, &job, &builtin],
        );
        assert_eq!(out, "override sends report on today");
    }

    #[test]
    fn test_unknown_placeholders_left_intact() {
        let out = substitute("hello {{name}} and {{ other.key }}", &[&vars(&[("name", "Ada")])]);
        assert_eq!(out, "hello Ada and {{ other.key }}");
    }

    #[test]
    fn test_text_payload_with_builtins() {
        let resolver = PayloadResolver::new("/nonexistent");
        let payload = Payload::text("Standup for {{date}} ({{weekday}}) at {{time}}");
        let out = resolver
            .resolve(&payload, &BTreeMap::new(), fixed_now())
            .unwrap();
        assert_eq!(out, "Standup for 2026-10-19 (Monday) at 09:05");
    }

    #[test]
    fn test_template_lookup_by_bare_name() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("digest.md"), "Digest for {{team}}").unwrap();
        let resolver = PayloadResolver::new(dir.path());

        let payload = Payload::Template {
            template: "digest".into(),
            variables: vars(&[("team", "ops")]),
        };
        let out = resolver
            .resolve(&payload, &BTreeMap::new(), fixed_now())
            .unwrap();
        assert_eq!(out, "Digest for ops");
    }

    #[test]
    fn test_file_payload_relative_and_absolute() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("note.txt"), "relative").unwrap();
        let resolver = PayloadResolver::new(dir.path());

        let relative = Payload::File {
            path: "note.txt".into(),
            variables: BTreeMap::new(),
        };
        assert_eq!(
            resolver.resolve(&relative, &BTreeMap::new(), fixed_now()).unwrap(),
            "relative"
        );

        let absolute = Payload::File {
            path: dir.path().join("note.txt").to_string_lossy().into_owned(),
            variables: BTreeMap::new(),
        };
        let elsewhere = PayloadResolver::new("/nonexistent");
        assert_eq!(
            elsewhere.resolve(&absolute, &BTreeMap::new(), fixed_now()).unwrap(),
            "relative"
        );
    }

    #[test]
    fn test_missing_files_are_errors() {
        let dir = TempDir::new().unwrap();
        let resolver = PayloadResolver::new(dir.path());

        let missing_template = Payload::Template {
            template: "nope".into(),
            variables: BTreeMap::new(),
        };
        assert!(matches!(
            resolver.resolve(&missing_template, &BTreeMap::new(), fixed_now()),
            Err(PayloadError::NotFound(_))
        ));

        let missing_file = Payload::File {
            path: "nope.txt".into(),
            variables: BTreeMap::new(),
        };
        assert!(matches!(
            resolver.resolve(&missing_file, &BTreeMap::new(), fixed_now()),
            Err(PayloadError::NotFound(_))
        ));
    }

    #[test]
    fn test_blank_message_rejected() {
        let resolver = PayloadResolver::new("/nonexistent");
        assert!(matches!(
            resolver.resolve(&Payload::text("   "), &BTreeMap::new(), fixed_now()),
            Err(PayloadError::Empty)
        ));
    }
}
