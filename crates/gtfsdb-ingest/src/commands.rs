//! Command entry points shared by the CLI and integration tests

use crate::db::DbConfig;
use crate::error::{IngestError, Result};
use crate::feed::Feed;
use crate::load::{clean_tables, LoadReport, Loader, DEFAULT_BATCH_SIZE};
use crate::progress::ProgressSink;
use crate::schema::{reconcile, EnumMode, ReconcileReport, TABLES};
use crate::validate::{FeedValidator, ValidateOptions, ValidationReport};
use serde::Serialize;
use sqlx::PgPool;
use std::path::Path;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Truncate every known table before loading
    pub clean: bool,
    pub batch_size: usize,
    pub skip_schema_sync: bool,
    pub enum_mode: EnumMode,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            clean: false,
            batch_size: DEFAULT_BATCH_SIZE,
            skip_schema_sync: false,
            enum_mode: EnumMode::Additive,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub schema: Option<ReconcileReport>,
    pub cleaned: Vec<String>,
    pub load: LoadReport,
}

/// Validate a feed without side effects.
pub fn validate(feed_dir: &Path, options: ValidateOptions) -> Result<ValidationReport> {
    let validator = FeedValidator::new(options)?;
    Ok(validator.validate(feed_dir)?)
}

/// Fails with [`IngestError::InvalidFeed`] unless the feed validates.
pub fn ensure_valid(feed_dir: &Path, options: ValidateOptions) -> Result<ValidationReport> {
    let report = validate(feed_dir, options)?;
    if !report.valid {
        report.log_summary();
        return Err(IngestError::InvalidFeed {
            errors: report.error_count(),
        });
    }
    info!("Feed validated");
    Ok(report)
}

/// Import preconditions that need no connection: database settings first,
/// then the optional feed validation.
pub fn preflight<F>(
    lookup: F,
    feed_dir: &Path,
    validate: Option<ValidateOptions>,
) -> Result<DbConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let config = DbConfig::from_lookup(lookup)?;
    if let Some(options) = validate {
        ensure_valid(feed_dir, options)?;
    }
    Ok(config)
}

pub async fn sync_schema(pool: &PgPool, mode: EnumMode) -> Result<ReconcileReport> {
    Ok(reconcile(pool, mode).await?)
}

/// Reconcile, optionally clean, then load the feed in dependency order.
#[instrument(skip_all, fields(feed = %feed_dir.display()))]
pub async fn import(
    pool: &PgPool,
    feed_dir: &Path,
    options: &ImportOptions,
    progress: &dyn ProgressSink,
) -> Result<ImportSummary> {
    let feed = Feed::open(feed_dir)?;

    let schema = if options.skip_schema_sync {
        info!("Skipping schema synchronization");
        None
    } else {
        Some(reconcile(pool, options.enum_mode).await?)
    };

    let cleaned = if options.clean {
        clean_tables(pool, TABLES).await?
    } else {
        Vec::new()
    };

    let load = Loader::new(pool, TABLES, progress, options.batch_size)
        .load(&feed)
        .await?;

    Ok(ImportSummary {
        schema,
        cleaned,
        load,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn db_env() -> HashMap<&'static str, String> {
        [
            ("DB_HOST", "localhost"),
            ("DB_PORT", "5432"),
            ("DB_USER", "gtfs"),
            ("DB_PASSWORD", "secret"),
            ("DB_NAME", "transit"),
        ]
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect()
    }

    #[test]
    fn test_preflight_reports_config_before_reading_feed() {
        let err = preflight(
            |_| None,
            Path::new("/definitely/not/a/feed"),
            Some(ValidateOptions::default()),
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::Config(_)), "{err}");
    }

    #[test]
    fn test_preflight_validates_after_config() {
        let env = db_env();
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("agency.txt"), "agency_id\nA1\n").unwrap();

        let err = preflight(
            |k| env.get(k).cloned(),
            dir.path(),
            Some(ValidateOptions::default()),
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::InvalidFeed { .. }), "{err}");

        let config = preflight(|k| env.get(k).cloned(), dir.path(), None).unwrap();
        assert_eq!(config.database, "transit");
    }
}
