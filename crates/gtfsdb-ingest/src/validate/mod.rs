//! Feed validation
//!
//! Checks file presence, header fields and record content without touching
//! the database. Every known file is checked; read failures become findings
//! instead of aborting the run.

pub mod report;

pub use report::{Diagnostic, FileReport, ValidationReport};

use crate::error::FeedError;
use crate::feed::rules::{self, ContentRules, FieldRule};
use crate::feed::{Feed, FeedFile};
use std::path::Path;
use tracing::{debug, instrument};

pub const DEFAULT_MAX_DIAGNOSTICS: usize = 100;

/// How many content problems are collected per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentMode {
    /// Stop at the first bad record of each file.
    #[default]
    FailFast,
    /// Keep going, recording up to `max_diagnostics` problems per file.
    Exhaustive { max_diagnostics: usize },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateOptions {
    pub strict_times: bool,
    pub mode: ContentMode,
}

pub struct FeedValidator {
    rules: ContentRules,
    mode: ContentMode,
}

impl FeedValidator {
    pub fn new(options: ValidateOptions) -> Result<Self, regex::Error> {
        Ok(Self {
            rules: ContentRules::new(options.strict_times)?,
            mode: options.mode,
        })
    }

    /// Validate the feed in `dir`.
    ///
    /// Only a directory that cannot be listed is an error; everything else
    /// lands in the report.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub fn validate(&self, dir: &Path) -> Result<ValidationReport, FeedError> {
        let feed = Feed::open(dir)?;
        Ok(self.validate_feed(&feed))
    }

    pub fn validate_feed(&self, feed: &Feed) -> ValidationReport {
        let mut files = Vec::new();

        let known = rules::REQUIRED_FILES
            .iter()
            .map(|stem| (*stem, true))
            .chain(rules::OPTIONAL_FILES.iter().map(|stem| (*stem, false)));

        for (stem, required) in known {
            let name = rules::file_name(stem);
            if !feed.has(stem) {
                files.push(FileReport::absent(name, required));
                continue;
            }
            files.push(self.check_file(feed, stem, name, required));
        }

        let warnings = feed
            .stems()
            .filter(|stem| !rules::is_known_file(stem))
            .map(|stem| format!("Unknown file {stem}.txt is not part of GTFS and will be ignored"))
            .collect();

        ValidationReport::new(feed.dir().display().to_string(), files, warnings)
    }

    fn check_file(&self, feed: &Feed, stem: &str, name: String, required: bool) -> FileReport {
        let mut report = FileReport {
            file: name,
            required,
            exists: true,
            ..FileReport::default()
        };

        let file = match feed.file(stem) {
            Ok(file) => file,
            Err(e) => {
                report.error = Some(e.to_string());
                return report;
            },
        };
        report.readable = true;

        report.missing_fields = rules::required_fields(stem)
            .iter()
            .filter(|field| !file.has_field(field))
            .map(|field| field.to_string())
            .collect();

        self.check_content(&file, &mut report);

        if report.readable && report.records_checked == 0 {
            report.empty = true;
        }
        report.fields_ok = report.missing_fields.is_empty() && !report.empty;

        debug!(
            file = %report.file,
            records = report.records_checked,
            ok = report.is_ok(),
            "Checked file"
        );
        report
    }

    fn check_content(&self, file: &FeedFile, report: &mut FileReport) {
        let checked: Vec<(usize, FieldRule)> = file
            .headers()
            .iter()
            .enumerate()
            .filter_map(|(i, h)| FieldRule::for_field(h).map(|rule| (i, rule)))
            .collect();

        let records = match file.records() {
            Ok(records) => records,
            Err(e) => {
                report.readable = false;
                report.error = Some(e.to_string());
                return;
            },
        };

        let limit = match self.mode {
            ContentMode::FailFast => 1,
            ContentMode::Exhaustive { max_diagnostics } => max_diagnostics.max(1),
        };

        for (index, record) in records.enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    report.readable = false;
                    report.error = Some(e.to_string());
                    break;
                },
            };
            report.records_checked += 1;

            let bad: Vec<Diagnostic> = record
                .iter()
                .enumerate()
                .filter_map(|(i, (field, value))| {
                    let (_, rule) = checked.iter().find(|(col, _)| *col == i)?;
                    self.rules.check(*rule, value).err().map(|reason| Diagnostic {
                        record: index as u64 + 1,
                        field: field.to_string(),
                        value: value.to_string(),
                        reason,
                    })
                })
                .collect();

            if bad.is_empty() {
                continue;
            }

            match self.mode {
                ContentMode::FailFast => {
                    report.diagnostics.extend(bad.into_iter().take(1));
                    break;
                },
                ContentMode::Exhaustive { .. } => {
                    let room = limit.saturating_sub(report.diagnostics.len());
                    if bad.len() > room {
                        report.truncated = true;
                    }
                    report.diagnostics.extend(bad.into_iter().take(room));
                    if report.truncated {
                        break;
                    }
                },
            }
        }

        report.content_ok = report.readable && report.diagnostics.is_empty();
    }
}
