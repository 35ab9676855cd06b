//! Live schema inspection
//!
//! Everything is read from `information_schema` and `pg_catalog` within
//! `current_schema()`. Nothing is cached between runs.

use crate::error::SchemaError;
use sqlx::PgConnection;

/// One live column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnState {
    pub name: String,
    /// `information_schema.columns.data_type`, e.g. `character varying`
    pub data_type: String,
    /// Underlying type name, e.g. `varchar` or an enum type name
    pub udt_name: String,
    pub nullable: bool,
}

/// Inspected state of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableState {
    pub exists: bool,
    pub columns: Vec<ColumnState>,
    pub has_primary_key: bool,
}

impl TableState {
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnState> {
        self.columns.iter().find(|c| c.name == name)
    }
}

pub async fn inspect_table(conn: &mut PgConnection, table: &str) -> Result<TableState, SchemaError> {
    let inspect_err = |source| SchemaError::Inspect {
        object: table.to_string(),
        source,
    };

    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM information_schema.tables
            WHERE table_schema = current_schema() AND table_name = $1
        )
        "#,
    )
    .bind(table)
    .fetch_one(&mut *conn)
    .await
    .map_err(inspect_err)?;

    if !exists {
        return Ok(TableState::missing());
    }

    let rows: Vec<(String, String, String, String)> = sqlx::query_as(
        r#"
        SELECT column_name::text, data_type::text, udt_name::text, is_nullable::text
        FROM information_schema.columns
        WHERE table_schema = current_schema() AND table_name = $1
        ORDER BY ordinal_position
        "#,
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await
    .map_err(inspect_err)?;

    let columns = rows
        .into_iter()
        .map(|(name, data_type, udt_name, is_nullable)| ColumnState {
            name,
            data_type,
            udt_name,
            nullable: is_nullable == "YES",
        })
        .collect();

    let has_primary_key: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM information_schema.table_constraints
            WHERE table_schema = current_schema()
              AND table_name = $1
              AND constraint_type = 'PRIMARY KEY'
        )
        "#,
    )
    .bind(table)
    .fetch_one(&mut *conn)
    .await
    .map_err(inspect_err)?;

    Ok(TableState {
        exists,
        columns,
        has_primary_key,
    })
}

/// Values of enum type `name` in sort order, or `None` if the type is absent.
pub async fn inspect_enum(
    conn: &mut PgConnection,
    name: &str,
) -> Result<Option<Vec<String>>, SchemaError> {
    let inspect_err = |source| SchemaError::Inspect {
        object: name.to_string(),
        source,
    };

    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM pg_type t
            JOIN pg_namespace n ON n.oid = t.typnamespace
            WHERE t.typname = $1 AND t.typtype = 'e' AND n.nspname = current_schema()
        )
        "#,
    )
    .bind(name)
    .fetch_one(&mut *conn)
    .await
    .map_err(inspect_err)?;

    if !exists {
        return Ok(None);
    }

    let values: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT e.enumlabel::text
        FROM pg_enum e
        JOIN pg_type t ON t.oid = e.enumtypid
        JOIN pg_namespace n ON n.oid = t.typnamespace
        WHERE t.typname = $1 AND n.nspname = current_schema()
        ORDER BY e.enumsortorder
        "#,
    )
    .bind(name)
    .fetch_all(&mut *conn)
    .await
    .map_err(inspect_err)?;

    Ok(Some(values))
}

/// Whether `table` exists in the current schema. Other schemas on the
/// search path are not considered.
pub async fn table_exists(conn: &mut PgConnection, table: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
         WHERE table_schema = current_schema() AND table_name = $1)",
    )
    .bind(table)
    .fetch_one(conn)
    .await
}
