//! Apply planned schema changes
//!
//! Default scope: one transaction for all enum types, then one transaction
//! per table. With [`EnumMode::Rebuild`] everything runs in a single
//! transaction, so columns dropped by `DROP TYPE .. CASCADE` are re-added
//! before anything commits.

use super::catalog::{reconciled_tables, EnumSpec, TableSpec, ENUMS};
use super::enums::{plan_enum, EnumMode};
use super::inspect::{inspect_enum, inspect_table};
use super::plan::{plan_table, type_drift, SchemaChange, TypeDrift};
use crate::error::SchemaError;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, instrument, warn};

const ENUM_SCOPE: &str = "enum types";
const ALL_SCOPE: &str = "schema";

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    /// DDL statements executed; zero when the schema already matched
    pub statements: usize,
    /// Human-readable description of each applied change
    pub applied: Vec<String>,
    #[serde(skip)]
    pub drift: Vec<TypeDrift>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.statements == 0
    }
}

/// Bring enum types and tables in line with the catalog.
pub async fn reconcile(pool: &PgPool, mode: EnumMode) -> Result<ReconcileReport, SchemaError> {
    let tables = reconciled_tables();
    Reconciler::new(ENUMS, &tables).run(pool, mode).await
}

/// Reconciles a fixed set of enums and tables.
pub struct Reconciler<'a> {
    enums: &'a [EnumSpec],
    tables: &'a [TableSpec],
}

impl<'a> Reconciler<'a> {
    pub fn new(enums: &'a [EnumSpec], tables: &'a [TableSpec]) -> Self {
        Self { enums, tables }
    }

    #[instrument(skip(self, pool))]
    pub async fn run(&self, pool: &PgPool, mode: EnumMode) -> Result<ReconcileReport, SchemaError> {
        let mut report = ReconcileReport::default();

        match mode {
            EnumMode::Additive => {
                let mut tx = begin(pool, ENUM_SCOPE).await?;
                self.reconcile_enums(&mut tx, mode, &mut report).await?;
                commit(tx, ENUM_SCOPE).await?;

                for spec in self.tables {
                    let mut tx = begin(pool, spec.name).await?;
                    reconcile_table(&mut tx, spec, &mut report).await?;
                    commit(tx, spec.name).await?;
                }
            },
            EnumMode::Rebuild => {
                warn!("Rebuilding enum types; columns using them are dropped and re-added empty");
                let mut tx = begin(pool, ALL_SCOPE).await?;
                self.reconcile_enums(&mut tx, mode, &mut report).await?;
                for spec in self.tables {
                    reconcile_table(&mut tx, spec, &mut report).await?;
                }
                commit(tx, ALL_SCOPE).await?;
            },
        }

        if report.is_noop() {
            info!("Schema already up to date");
        } else {
            info!(statements = report.statements, "Schema reconciled");
        }

        Ok(report)
    }

    async fn reconcile_enums(
        &self,
        conn: &mut PgConnection,
        mode: EnumMode,
        report: &mut ReconcileReport,
    ) -> Result<(), SchemaError> {
        for spec in self.enums {
            let live = inspect_enum(conn, spec.name).await?;
            for change in plan_enum(spec, live.as_deref(), mode) {
                apply(conn, &change, report).await?;
            }
        }
        Ok(())
    }
}

async fn reconcile_table(
    conn: &mut PgConnection,
    spec: &TableSpec,
    report: &mut ReconcileReport,
) -> Result<(), SchemaError> {
    let state = inspect_table(conn, spec.name).await?;

    for drift in type_drift(spec, &state) {
        warn!(
            table = %drift.table,
            column = %drift.column,
            expected = %drift.expected,
            actual = %drift.actual,
            "Column type differs from declaration; leaving it unchanged"
        );
        report.drift.push(drift);
    }

    let changes = plan_table(spec, &state);
    if changes.is_empty() {
        debug!(table = spec.name, "Table up to date");
    }
    for change in &changes {
        apply(conn, change, report).await?;
    }
    Ok(())
}

async fn apply(
    conn: &mut PgConnection,
    change: &SchemaChange,
    report: &mut ReconcileReport,
) -> Result<(), SchemaError> {
    let statement = change.to_sql();
    info!(object = change.object(), change = %change, "Applying schema change");

    sqlx::query(&statement)
        .execute(&mut *conn)
        .await
        .map_err(|source| SchemaError::Apply {
            object: change.object().to_string(),
            statement: statement.clone(),
            source,
        })?;

    report.statements += 1;
    report.applied.push(change.to_string());
    Ok(())
}

async fn begin(
    pool: &PgPool,
    object: &str,
) -> Result<sqlx::Transaction<'static, sqlx::Postgres>, SchemaError> {
    pool.begin().await.map_err(|source| SchemaError::Transaction {
        object: object.to_string(),
        source,
    })
}

async fn commit(tx: sqlx::Transaction<'_, sqlx::Postgres>, object: &str) -> Result<(), SchemaError> {
    tx.commit().await.map_err(|source| SchemaError::Transaction {
        object: object.to_string(),
        source,
    })
}
