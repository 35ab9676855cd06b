//! Validation findings
//!
//! A [`ValidationReport`] is plain data: it is printed as text through
//! `tracing` or serialized to JSON for tooling.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

/// One bad value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// 1-based data record number; the header is not counted
    pub record: u64,
    pub field: String,
    pub value: String,
    pub reason: String,
}

/// Findings for one feed file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub file: String,
    pub required: bool,
    pub exists: bool,
    pub readable: bool,
    /// Header present but no data records
    pub empty: bool,
    pub fields_ok: bool,
    pub missing_fields: Vec<String>,
    pub content_ok: bool,
    pub diagnostics: Vec<Diagnostic>,
    /// More diagnostics existed than were kept
    pub truncated: bool,
    pub records_checked: u64,
    /// Read error, when the file could not be fully read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    pub fn absent(file: String, required: bool) -> Self {
        Self {
            file,
            required,
            ..Self::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        if !self.exists {
            return !self.required;
        }
        self.readable && self.fields_ok && self.content_ok
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub feed_dir: String,
    pub valid: bool,
    pub files: Vec<FileReport>,
    /// Non-fatal notices such as unrecognized files
    pub warnings: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl ValidationReport {
    pub fn new(feed_dir: String, files: Vec<FileReport>, warnings: Vec<String>) -> Self {
        let valid = files.iter().all(FileReport::is_ok);
        Self {
            feed_dir,
            valid,
            files,
            warnings,
            generated_at: Utc::now(),
        }
    }

    /// Number of files with at least one finding.
    pub fn error_count(&self) -> usize {
        self.files.iter().filter(|f| !f.is_ok()).count()
    }

    pub fn file(&self, name: &str) -> Option<&FileReport> {
        self.files.iter().find(|f| f.file == name)
    }

    /// Human-readable summary through `tracing`.
    pub fn log_summary(&self) {
        info!(feed = %self.feed_dir, "Validation results");

        for file in &self.files {
            if !file.exists {
                if file.required {
                    error!(file = %file.file, "Required file is missing");
                }
                continue;
            }
            if let Some(ref err) = file.error {
                error!(file = %file.file, error = %err, "File is not readable");
            }
            if file.empty {
                error!(file = %file.file, "File is empty");
            } else if !file.missing_fields.is_empty() {
                error!(
                    file = %file.file,
                    missing = %file.missing_fields.join(", "),
                    "Missing required fields"
                );
            }
            for d in &file.diagnostics {
                error!(
                    file = %file.file,
                    record = d.record,
                    field = %d.field,
                    value = %d.value,
                    "{}",
                    d.reason
                );
            }
            if file.truncated {
                warn!(file = %file.file, "Further content errors not shown");
            }
            if file.is_ok() {
                info!(file = %file.file, records = file.records_checked, "File is valid");
            }
        }

        for warning in &self.warnings {
            warn!("{warning}");
        }

        if self.valid {
            info!("Feed is valid");
        } else {
            error!(errors = self.error_count(), "Feed is invalid");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn ok_file(name: &str) -> FileReport {
        FileReport {
            file: name.to_string(),
            required: true,
            exists: true,
            readable: true,
            fields_ok: true,
            content_ok: true,
            records_checked: 1,
            ..FileReport::default()
        }
    }

    #[test]
    fn test_missing_optional_file_is_ok() {
        assert!(FileReport::absent("shapes.txt".into(), false).is_ok());
        assert!(!FileReport::absent("routes.txt".into(), true).is_ok());
    }

    #[test]
    fn test_verdict() {
        let mut bad = ok_file("stops.txt");
        bad.content_ok = false;

        let report = ValidationReport::new(
            "feed".into(),
            vec![ok_file("agency.txt"), bad],
            vec!["Unknown file vehicles.txt".into()],
        );
        assert!(!report.valid);
        assert_eq!(report.error_count(), 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["files"][1]["file"], "stops.txt");
        assert!(json["files"][0].get("error").is_none());
    }
}
