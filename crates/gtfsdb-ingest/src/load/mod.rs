//! Loading feed records into PostgreSQL
//!
//! - [`cleanup`]: optional all-or-nothing truncation before a load
//! - [`loader`]: per-table streaming in dependency order
//! - [`batch`]: batch assembly and the sinks that execute them
//! - [`literal`]: value escaping

pub mod batch;
pub mod cleanup;
pub mod literal;
pub mod loader;

pub use batch::{BatchSink, BatchTarget, InsertBatch, PgBatchSink};
pub use cleanup::clean_tables;
pub use loader::{LoadReport, Loader, TableLoad, DEFAULT_BATCH_SIZE};
