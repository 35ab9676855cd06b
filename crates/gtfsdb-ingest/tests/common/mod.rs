//! Shared helpers for gtfsdb-ingest integration tests
//!
//! Database tests start a throwaway PostgreSQL container through
//! testcontainers, so they need Docker and are `#[ignore]`d by default:
//!
//! ```text
//! cargo test -p gtfsdb-ingest -- --ignored
//! ```

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::{debug, info};

/// PostgreSQL container plus a connected pool.
///
/// The container stops when this value is dropped.
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    url: String,
    pool: PgPool,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let url = format!("postgresql://postgres:postgres@{host}:{port}/postgres");
        debug!("PostgreSQL connection: {url}");

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self {
            _container: container,
            url,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Pool over a single connection, so session settings seen by one
    /// query are the ones left behind by the previous.
    pub async fn single_connection_pool(&self) -> PgPool {
        PgPoolOptions::new()
            .max_connections(1)
            .connect(&self.url)
            .await
            .expect("single connection pool")
    }

    /// Pool whose connections start with `search_path` set.
    pub async fn pool_with_search_path(&self, search_path: &str) -> PgPool {
        let options = PgConnectOptions::from_str(&self.url)
            .expect("connection url")
            .options([("search_path", search_path)]);
        PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("search path pool")
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{table}\""))
            .fetch_one(&self.pool)
            .await
            .expect("count query failed")
    }
}

/// Path of a fixture feed under `tests/fixtures`.
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Initialize test logging once; later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("gtfsdb_ingest=debug,sqlx=warn")
        .with_test_writer()
        .try_init();
}
