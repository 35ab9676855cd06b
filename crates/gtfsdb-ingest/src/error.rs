//! Error types for feed ingestion
//!
//! Each stage has its own error enum so callers can tell a broken feed
//! apart from a broken database. [`IngestError`] is the top-level type
//! returned by the command entry points.

use gtfsdb_common::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Problems reading feed files from disk.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed delimited data in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl FeedError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}

/// Schema inspection or DDL application failed.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to inspect {object}: {source}")]
    Inspect {
        object: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to reconcile {object} while executing `{statement}`: {source}")]
    Apply {
        object: String,
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Transaction for {object} failed: {source}")]
    Transaction {
        object: String,
        #[source]
        source: sqlx::Error,
    },
}

impl SchemaError {
    /// Table or enum type the failure belongs to.
    pub fn object(&self) -> &str {
        match self {
            SchemaError::Inspect { object, .. }
            | SchemaError::Apply { object, .. }
            | SchemaError::Transaction { object, .. } => object,
        }
    }
}

/// Cleanup or bulk load failed.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("Failed to truncate {table}: {source}")]
    Cleanup {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error(
        "Batch {batch_index} for {table} failed after {rows_committed} rows were committed: {source}"
    )]
    BatchFailed {
        table: String,
        batch_index: usize,
        rows_committed: u64,
        #[source]
        source: sqlx::Error,
    },

    #[error("Value in {table}.{column} cannot be written as a literal: {reason}")]
    Literal {
        table: String,
        column: String,
        reason: String,
    },

    #[error("Failed to acquire a database connection: {0}")]
    Connection(#[source] sqlx::Error),
}

/// Top-level error for the ingest commands.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid content pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Feed failed validation with {errors} error(s)")]
    InvalidFeed { errors: usize },
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_failed_names_table_and_progress() {
        let err = LoadError::BatchFailed {
            table: "stop_times".into(),
            batch_index: 3,
            rows_committed: 3000,
            source: sqlx::Error::PoolTimedOut,
        };
        let message = err.to_string();
        assert!(message.contains("stop_times"));
        assert!(message.contains("Batch 3"));
        assert!(message.contains("3000 rows"));
    }

    #[test]
    fn test_schema_error_object() {
        let err = SchemaError::Apply {
            object: "routes".into(),
            statement: "ALTER TABLE routes ADD COLUMN network_id VARCHAR(255)".into(),
            source: sqlx::Error::PoolClosed,
        };
        assert_eq!(err.object(), "routes");
        assert!(err.to_string().contains("ADD COLUMN network_id"));
    }

    #[test]
    fn test_config_error_converts() {
        let err: IngestError = ConfigError::MissingEnv(vec!["DB_HOST".into()]).into();
        assert!(err.to_string().contains("DB_HOST"));
    }
}
