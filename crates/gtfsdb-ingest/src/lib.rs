//! gtfsdb Ingest Library
//!
//! Validates GTFS feed directories and loads them into PostgreSQL.
//!
//! # Pipeline
//!
//! - **Validation** ([`validate`]): files, header fields and record content
//! - **Schema reconciliation** ([`schema`]): create or evolve tables and enum types
//! - **Loading** ([`load`]): optional cleanup, then batched insert-if-absent
//!   writes in dependency order
//!
//! # Example
//!
//! ```no_run
//! use gtfsdb_ingest::{commands, db, progress::NoProgress};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = db::create_pool(&db::DbConfig::from_env()?).await?;
//!     let summary = commands::import(
//!         &pool,
//!         Path::new("./feeds/metro"),
//!         &commands::ImportOptions::default(),
//!         &NoProgress,
//!     )
//!     .await?;
//!     println!("{} rows inserted", summary.load.rows_inserted());
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod commands;
pub mod db;
pub mod error;
pub mod feed;
pub mod load;
pub mod progress;
pub mod schema;
pub mod validate;

pub use error::{FeedError, IngestError, LoadError, SchemaError};
