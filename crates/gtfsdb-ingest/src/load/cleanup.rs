//! Pre-load table cleanup
//!
//! All known tables are truncated in reverse processing order inside one
//! transaction, with triggers and FK enforcement suspended through
//! `SET LOCAL session_replication_role = replica`. Being `LOCAL`, the
//! setting ends with the transaction on commit and on rollback alike.

use crate::error::LoadError;
use crate::schema::inspect::table_exists;
use crate::schema::plan::quote_ident;
use crate::schema::TableSpec;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, instrument};

const ALL_TABLES: &str = "all tables";

/// Truncate every existing table in `tables`, children first.
///
/// Returns the names of the tables truncated. On failure nothing is
/// truncated.
#[instrument(skip_all)]
pub async fn clean_tables(pool: &PgPool, tables: &[TableSpec]) -> Result<Vec<String>, LoadError> {
    let mut tx = pool.begin().await.map_err(LoadError::Connection)?;

    set_replication_role(&mut tx, "replica").await?;
    let truncated = truncate_all(&mut tx, tables).await?;
    set_replication_role(&mut tx, "DEFAULT").await?;

    tx.commit().await.map_err(|source| LoadError::Cleanup {
        table: ALL_TABLES.to_string(),
        source,
    })?;

    info!(tables = truncated.len(), "Existing data cleaned");
    Ok(truncated)
}

async fn truncate_all(
    conn: &mut PgConnection,
    tables: &[TableSpec],
) -> Result<Vec<String>, LoadError> {
    let mut truncated = Vec::new();

    for spec in tables.iter().rev() {
        let exists = table_exists(conn, spec.name)
            .await
            .map_err(|source| LoadError::Cleanup {
                table: spec.name.to_string(),
                source,
            })?;
        if !exists {
            debug!(table = spec.name, "Table does not exist, nothing to clean");
            continue;
        }

        sqlx::query(&format!("TRUNCATE TABLE {} CASCADE", quote_ident(spec.name)))
            .execute(&mut *conn)
            .await
            .map_err(|source| LoadError::Cleanup {
                table: spec.name.to_string(),
                source,
            })?;

        info!(table = spec.name, "Truncated table");
        truncated.push(spec.name.to_string());
    }

    Ok(truncated)
}

async fn set_replication_role(conn: &mut PgConnection, role: &str) -> Result<(), LoadError> {
    sqlx::query(&format!("SET LOCAL session_replication_role = {role}"))
        .execute(conn)
        .await
        .map_err(|source| LoadError::Cleanup {
            table: ALL_TABLES.to_string(),
            source,
        })?;
    Ok(())
}
