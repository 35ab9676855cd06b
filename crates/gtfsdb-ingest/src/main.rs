//! gtfsdb - GTFS feed validation and PostgreSQL import

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gtfsdb_common::env::process_env;
use gtfsdb_common::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use gtfsdb_ingest::commands::{self, ImportOptions};
use gtfsdb_ingest::db::{create_pool, health_check, DbConfig};
use gtfsdb_ingest::load::DEFAULT_BATCH_SIZE;
use gtfsdb_ingest::IngestError;
use gtfsdb_ingest::progress::ProgressMode;
use gtfsdb_ingest::schema::EnumMode;
use gtfsdb_ingest::validate::{ContentMode, ValidateOptions, DEFAULT_MAX_DIAGNOSTICS};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "gtfsdb")]
#[command(author, version, about = "GTFS feed validation and PostgreSQL import")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log line format
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormatArg>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a feed directory into the database
    Import {
        /// Directory containing the GTFS .txt files
        feed_dir: PathBuf,

        /// Truncate all GTFS tables before loading
        #[arg(long)]
        clean: bool,

        /// Records per INSERT statement
        #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE as u64,
              value_parser = clap::value_parser!(u64).range(1..))]
        batch_size: u64,

        /// Do not create or alter tables before loading
        #[arg(long)]
        skip_schema_sync: bool,

        /// Drop and recreate enum types (drops dependent columns and their data)
        #[arg(long)]
        rebuild_enums: bool,

        /// Validate the feed first and stop if it is invalid
        #[arg(long)]
        validate_first: bool,

        /// Progress display
        #[arg(long, value_enum, default_value_t = ProgressMode::Auto)]
        progress: ProgressMode,
    },

    /// Check a feed directory without touching the database
    Validate {
        feed_dir: PathBuf,

        /// Only accept hours 00-23 in stop times
        #[arg(long)]
        strict_times: bool,

        /// Report every bad record instead of the first per file
        #[arg(long)]
        exhaustive: bool,

        /// Per-file cap on reported records in exhaustive mode
        #[arg(long, default_value_t = DEFAULT_MAX_DIAGNOSTICS)]
        max_diagnostics: usize,

        /// Report format
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
    },

    /// Create or evolve tables and enum types
    SyncSchema {
        /// Drop and recreate enum types (drops dependent columns and their data)
        #[arg(long)]
        rebuild_enums: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LogFormatArg {
    Text,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ReportFormat {
    Text,
    Json,
}

fn enum_mode(rebuild: bool) -> EnumMode {
    if rebuild {
        EnumMode::Rebuild
    } else {
        EnumMode::Additive
    }
}

async fn connect(config: &DbConfig) -> Result<sqlx::PgPool> {
    let pool = create_pool(config)
        .await
        .with_context(|| format!("Failed to connect to {}:{}", config.host, config.port))?;
    health_check(&pool).await.context("Database health check failed")?;
    Ok(pool)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let mut log_config = LogConfig::from_env()?.with_file_prefix("gtfsdb");
    if cli.verbose {
        log_config = log_config.with_level(LogLevel::Debug);
    }
    match cli.log_format {
        Some(LogFormatArg::Json) => log_config = log_config.with_format(LogFormat::Json),
        Some(LogFormatArg::Text) => log_config = log_config.with_format(LogFormat::Text),
        None => {},
    }
    let _log_guard = init_logging(&log_config)?;

    match cli.command {
        Command::Validate {
            feed_dir,
            strict_times,
            exhaustive,
            max_diagnostics,
            format,
        } => {
            let mode = if exhaustive {
                ContentMode::Exhaustive { max_diagnostics }
            } else {
                ContentMode::FailFast
            };
            let report = commands::validate(&feed_dir, ValidateOptions { strict_times, mode })?;

            match format {
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                ReportFormat::Text => report.log_summary(),
            }

            if !report.valid {
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::SyncSchema { rebuild_enums } => {
            let pool = connect(&DbConfig::from_env()?).await?;
            let report = commands::sync_schema(&pool, enum_mode(rebuild_enums)).await?;
            info!(statements = report.statements, "Schema synchronization complete");
        },
        Command::Import {
            feed_dir,
            clean,
            batch_size,
            skip_schema_sync,
            rebuild_enums,
            validate_first,
            progress,
        } => {
            let validation = validate_first.then(ValidateOptions::default);
            let config = match commands::preflight(process_env, &feed_dir, validation) {
                Ok(config) => config,
                Err(IngestError::Config(e)) => return Err(e.into()),
                Err(e) => {
                    error!("{e}");
                    return Ok(ExitCode::FAILURE);
                },
            };

            let options = ImportOptions {
                clean,
                batch_size: usize::try_from(batch_size).context("Batch size is too large")?,
                skip_schema_sync,
                enum_mode: enum_mode(rebuild_enums),
            };

            let pool = connect(&config).await?;
            let sink = progress.sink();
            let summary = commands::import(&pool, &feed_dir, &options, sink.as_ref()).await?;

            for table in &summary.load.tables {
                info!(
                    table = %table.table,
                    rows_read = table.rows_read,
                    rows_inserted = table.rows_inserted,
                    duplicates = table.duplicates(),
                    "Imported"
                );
            }
            info!(rows = summary.load.rows_inserted(), "Import complete");
        },
    }

    Ok(ExitCode::SUCCESS)
}
