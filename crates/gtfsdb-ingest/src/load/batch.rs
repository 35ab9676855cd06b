//! Batched insert-if-absent writes
//!
//! Records are grouped into [`InsertBatch`]es; each batch becomes exactly
//! one `INSERT .. VALUES (..), (..) ON CONFLICT DO NOTHING` statement.
//! Where batches go is abstracted by [`BatchTarget`] / [`BatchSink`] so the
//! batching can be exercised without a database.

use super::literal;
use crate::error::LoadError;
use crate::feed::Record;
use crate::schema::plan::quote_ident;
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use std::sync::Arc;

/// One statement's worth of rows for one table.
#[derive(Debug, Clone)]
pub struct InsertBatch {
    pub table: String,
    pub columns: Arc<[String]>,
    /// Rendered value tuples, e.g. `('S1', NULL, '45.5')`
    rows: Vec<String>,
}

impl InsertBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES {} ON CONFLICT DO NOTHING",
            quote_ident(&self.table),
            columns,
            self.rows.join(", ")
        )
    }
}

/// Accumulates records into batches of at most `batch_size` rows.
pub struct BatchBuilder {
    table: String,
    columns: Arc<[String]>,
    batch_size: usize,
    rows: Vec<String>,
}

impl BatchBuilder {
    pub fn new(table: impl Into<String>, columns: Vec<String>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            table: table.into(),
            columns: columns.into(),
            batch_size,
            rows: Vec::with_capacity(batch_size),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Add one record; only the builder's columns are taken from it.
    pub fn push(&mut self, record: &Record) -> Result<(), LoadError> {
        let mut values = Vec::with_capacity(self.columns.len());
        for column in self.columns.iter() {
            let value = literal::encode(record.get(column)).map_err(|e| LoadError::Literal {
                table: self.table.clone(),
                column: column.clone(),
                reason: e.to_string(),
            })?;
            values.push(value);
        }
        self.rows.push(format!("({})", values.join(", ")));
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.rows.len() >= self.batch_size
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Hand out the pending rows and start a fresh batch.
    pub fn take(&mut self) -> InsertBatch {
        InsertBatch {
            table: self.table.clone(),
            columns: Arc::clone(&self.columns),
            rows: std::mem::replace(&mut self.rows, Vec::with_capacity(self.batch_size)),
        }
    }
}

/// Writes batches for one file.
#[async_trait]
pub trait BatchSink: Send {
    /// Execute one batch; returns the number of rows actually inserted.
    async fn write(&mut self, batch: &InsertBatch) -> Result<u64, sqlx::Error>;
}

/// Hands out one [`BatchSink`] per file.
#[async_trait]
pub trait BatchTarget: Sync {
    async fn open(&self, table: &str) -> Result<Box<dyn BatchSink>, LoadError>;
}

/// Holds one pooled connection; it returns to the pool when dropped.
pub struct PgBatchSink {
    conn: PoolConnection<Postgres>,
}

impl PgBatchSink {
    pub async fn acquire(pool: &PgPool) -> Result<Self, LoadError> {
        let conn = pool.acquire().await.map_err(LoadError::Connection)?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl BatchSink for PgBatchSink {
    async fn write(&mut self, batch: &InsertBatch) -> Result<u64, sqlx::Error> {
        let sql = batch.to_sql();
        let result = sqlx::query(&sql).execute(&mut *self.conn).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl BatchTarget for PgPool {
    async fn open(&self, _table: &str) -> Result<Box<dyn BatchSink>, LoadError> {
        Ok(Box::new(PgBatchSink::acquire(self).await?))
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::feed::FeedFile;
    use std::fs;
    use tempfile::TempDir;

    fn records(contents: &str) -> (TempDir, Vec<Record>) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stops.txt");
        fs::write(&path, contents).unwrap();
        let file = FeedFile::open(path).unwrap();
        let records = file.records().unwrap().map(Result::unwrap).collect();
        (dir, records)
    }

    #[test]
    fn test_statement_shape() {
        let (_dir, records) = records("stop_id,stop_name,zone_id\nS1,Gare d'Austerlitz,\nS2,Elm,Z1\n");
        let mut builder = BatchBuilder::new(
            "stops",
            vec!["stop_id".into(), "stop_name".into(), "zone_id".into()],
            10,
        );
        for record in &records {
            builder.push(record).unwrap();
        }

        let batch = builder.take();
        assert_eq!(batch.len(), 2);
        assert_eq!(
            batch.to_sql(),
            "INSERT INTO \"stops\" (\"stop_id\", \"stop_name\", \"zone_id\") VALUES \
             ('S1', 'Gare d''Austerlitz', NULL), ('S2', 'Elm', 'Z1') ON CONFLICT DO NOTHING"
        );
        assert!(builder.is_empty());
    }

    #[test]
    fn test_builder_fills_up() {
        let (_dir, records) = records("stop_id\nS1\nS2\n");
        let mut builder = BatchBuilder::new("stops", vec!["stop_id".into()], 2);
        builder.push(&records[0]).unwrap();
        assert!(!builder.is_full());
        builder.push(&records[1]).unwrap();
        assert!(builder.is_full());
    }

    #[test]
    fn test_nul_byte_names_column() {
        let (_dir, records) = records("stop_id,stop_name\nS1,bad\0name\n");
        let mut builder =
            BatchBuilder::new("stops", vec!["stop_id".into(), "stop_name".into()], 10);

        let err = builder.push(&records[0]).unwrap_err();
        assert!(
            matches!(err, LoadError::Literal { ref table, ref column, .. } if table == "stops" && column == "stop_name")
        );
    }
}
