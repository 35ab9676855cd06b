//! Dependency-ordered feed loading
//!
//! Tables are filled in catalog order so parents always precede children.
//! Each file is streamed twice: once to count records for progress, once to
//! build and write batches over a single sink (one pooled connection).

use super::batch::{BatchBuilder, BatchSink, BatchTarget};
use crate::error::LoadError;
use crate::feed::{Feed, FeedFile};
use crate::progress::ProgressSink;
use crate::schema::TableSpec;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, instrument, warn};

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Outcome for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableLoad {
    pub table: String,
    pub rows_read: u64,
    pub batches: usize,
    /// Rows the database accepted; duplicates of existing keys are not counted
    pub rows_inserted: u64,
    /// Header columns with no matching table column
    pub dropped_columns: Vec<String>,
}

impl TableLoad {
    pub fn duplicates(&self) -> u64 {
        self.rows_read.saturating_sub(self.rows_inserted)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub tables: Vec<TableLoad>,
    /// Feed files that are not loaded into any table
    pub skipped_files: Vec<String>,
}

impl LoadReport {
    pub fn table(&self, name: &str) -> Option<&TableLoad> {
        self.tables.iter().find(|t| t.table == name)
    }

    pub fn rows_inserted(&self) -> u64 {
        self.tables.iter().map(|t| t.rows_inserted).sum()
    }
}

pub struct Loader<'a, T: ?Sized> {
    target: &'a T,
    tables: &'a [TableSpec],
    progress: &'a dyn ProgressSink,
    batch_size: usize,
}

impl<'a, T> Loader<'a, T>
where
    T: BatchTarget + ?Sized,
{
    pub fn new(
        target: &'a T,
        tables: &'a [TableSpec],
        progress: &'a dyn ProgressSink,
        batch_size: usize,
    ) -> Self {
        Self {
            target,
            tables,
            progress,
            batch_size: batch_size.max(1),
        }
    }

    /// Load every present file. Stops at the first failed table.
    #[instrument(skip_all, fields(feed = %feed.dir().display(), batch_size = self.batch_size))]
    pub async fn load(&self, feed: &Feed) -> Result<LoadReport, LoadError> {
        let mut report = LoadReport::default();

        for stem in feed.stems() {
            if !self.tables.iter().any(|t| t.file == stem) {
                warn!(file = %format!("{stem}.txt"), "File is not loaded into any table, skipping");
                report.skipped_files.push(format!("{stem}.txt"));
            }
        }

        for spec in self.tables {
            if !feed.has(spec.file) {
                info!(table = spec.name, "No {}.txt in feed, skipping", spec.file);
                continue;
            }
            let file = feed.file(spec.file)?;
            report.tables.push(self.load_table(spec, &file).await?);
        }

        info!(
            tables = report.tables.len(),
            rows = report.rows_inserted(),
            "Feed loaded"
        );
        Ok(report)
    }

    #[instrument(skip_all, fields(table = spec.name))]
    async fn load_table(&self, spec: &TableSpec, file: &FeedFile) -> Result<TableLoad, LoadError> {
        let started = Instant::now();
        let mut result = TableLoad {
            table: spec.name.to_string(),
            ..TableLoad::default()
        };

        let (columns, dropped): (Vec<String>, Vec<String>) = file
            .headers()
            .iter()
            .cloned()
            .partition(|h| spec.column(h).is_some());
        if !dropped.is_empty() {
            warn!(
                table = spec.name,
                columns = %dropped.join(", "),
                "Dropping columns not present in the table"
            );
        }
        result.dropped_columns = dropped;

        if columns.is_empty() {
            warn!(table = spec.name, "No loadable columns in header, skipping");
            return Ok(result);
        }

        let total = file.count_records()?;
        self.progress.begin(spec.name, total);
        if let Err(e) = self.write_records(spec, file, columns, &mut result).await {
            self.progress.abandon();
            return Err(e);
        }
        self.progress.finish();

        info!(
            table = spec.name,
            rows_read = result.rows_read,
            rows_inserted = result.rows_inserted,
            duplicates = result.duplicates(),
            batches = result.batches,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Table loaded"
        );
        Ok(result)
    }

    async fn write_records(
        &self,
        spec: &TableSpec,
        file: &FeedFile,
        columns: Vec<String>,
        result: &mut TableLoad,
    ) -> Result<(), LoadError> {
        let mut sink = self.target.open(spec.name).await?;
        let mut builder = BatchBuilder::new(spec.name, columns, self.batch_size);

        for record in file.records()? {
            let record = record?;
            result.rows_read += 1;
            builder.push(&record)?;
            if builder.is_full() {
                self.flush(sink.as_mut(), &mut builder, result).await?;
            }
        }
        if !builder.is_empty() {
            self.flush(sink.as_mut(), &mut builder, result).await?;
        }
        Ok(())
    }

    async fn flush(
        &self,
        sink: &mut dyn BatchSink,
        builder: &mut BatchBuilder,
        result: &mut TableLoad,
    ) -> Result<(), LoadError> {
        let batch = builder.take();
        let inserted = sink
            .write(&batch)
            .await
            .map_err(|source| LoadError::BatchFailed {
                table: result.table.clone(),
                batch_index: result.batches,
                rows_committed: result.rows_inserted,
                source,
            })?;

        result.batches += 1;
        result.rows_inserted += inserted;
        self.progress.advance(batch.len() as u64);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::load::batch::recording::RecordingTarget;
    use crate::progress::NoProgress;
    use crate::schema::TABLES;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const FILES: &[(&str, &str)] = &[
        ("agency.txt", "agency_id,agency_name,agency_url,agency_timezone\nA1,Metro,https://m.example,UTC\n"),
        ("stops.txt", "stop_id,stop_name,stop_lat,stop_lon\nS1,Main,45.5,-73.6\nS2,Elm,45.6,-73.7\n"),
        ("routes.txt", "route_id,agency_id,route_short_name,route_long_name,route_type\nR1,A1,1,Red,1\n"),
        ("calendar.txt", "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\nWK,1,1,1,1,1,0,0,20240101,20241231\n"),
        ("calendar_dates.txt", "service_id,date,exception_type\nWK,20240704,2\n"),
        ("shapes.txt", "shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence\nSH1,45.5,-73.6,1\n"),
        ("trips.txt", "route_id,service_id,trip_id,shape_id\nR1,WK,T1,SH1\n"),
        ("stop_times.txt", "trip_id,arrival_time,departure_time,stop_id,stop_sequence\nT1,08:00:00,08:00:00,S1,1\nT1,08:05:00,08:05:00,S2,2\nT1,08:10:00,08:10:00,S1,3\n"),
    ];

    fn feed_with(names: &[&str]) -> (TempDir, Feed) {
        let dir = TempDir::new().unwrap();
        for (name, contents) in FILES.iter().filter(|(n, _)| names.contains(n)) {
            fs::write(dir.path().join(name), contents).unwrap();
        }
        let feed = Feed::open(dir.path()).unwrap();
        (dir, feed)
    }

    /// Keeps the begin/finish/abandon sequence.
    #[derive(Default)]
    struct EventProgress {
        events: Mutex<Vec<String>>,
    }

    impl EventProgress {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ProgressSink for EventProgress {
        fn begin(&self, table: &str, _total: u64) {
            self.events.lock().unwrap().push(format!("begin {table}"));
        }
        fn advance(&self, _n: u64) {}
        fn finish(&self) {
            self.events.lock().unwrap().push("finish".into());
        }
        fn abandon(&self) {
            self.events.lock().unwrap().push("abandon".into());
        }
    }

    fn all_files() -> Vec<&'static str> {
        FILES.iter().map(|(n, _)| *n).collect()
    }

    #[tokio::test]
    async fn test_parents_are_written_before_children() {
        let (_dir, feed) = feed_with(&all_files());
        let target = RecordingTarget::default();

        Loader::new(&target, TABLES, &NoProgress, 1000).load(&feed).await.unwrap();

        let written = target.tables();
        for spec in TABLES {
            let child = written.iter().position(|t| t == spec.name).unwrap();
            for parent in spec.depends_on {
                let parent = written.iter().position(|t| t == parent).unwrap();
                assert!(parent < child, "{written:?}");
            }
        }
    }

    #[tokio::test]
    async fn test_order_holds_for_any_subset() {
        let names = all_files();
        // every subset of the eight files
        for mask in 0u32..(1 << names.len()) {
            let subset: Vec<&str> = names
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, n)| *n)
                .collect();
            let (_dir, feed) = feed_with(&subset);
            let target = RecordingTarget::default();

            Loader::new(&target, TABLES, &NoProgress, 1000).load(&feed).await.unwrap();

            let written = target.tables();
            assert_eq!(written.len(), subset.len());
            let positions: Vec<usize> = written
                .iter()
                .map(|t| TABLES.iter().position(|s| s.name == t).unwrap())
                .collect();
            assert!(positions.windows(2).all(|w| w[0] < w[1]), "{written:?}");
        }
    }

    #[tokio::test]
    async fn test_batch_size_boundaries() {
        let (_dir, feed) = feed_with(&["stop_times.txt"]);

        let target = RecordingTarget::default();
        let report = Loader::new(&target, TABLES, &NoProgress, 1).load(&feed).await.unwrap();
        assert_eq!(target.writes().len(), 3);
        assert!(target.writes().iter().all(|w| w.rows == 1));
        assert_eq!(report.table("stop_times").unwrap().batches, 3);

        let target = RecordingTarget::default();
        let report = Loader::new(&target, TABLES, &NoProgress, 1000).load(&feed).await.unwrap();
        assert_eq!(target.writes().len(), 1);
        assert_eq!(target.writes()[0].rows, 3);
        assert_eq!(report.table("stop_times").unwrap().rows_inserted, 3);
    }

    #[tokio::test]
    async fn test_failed_batch_stops_the_run() {
        let (_dir, feed) = feed_with(&["stops.txt", "stop_times.txt"]);
        // stops: batches 0,1; stop_times: batch 2 succeeds, 3 fails
        let target = RecordingTarget::failing_at(3);

        let err = Loader::new(&target, TABLES, &NoProgress, 1).load(&feed).await.unwrap_err();
        match err {
            LoadError::BatchFailed {
                table,
                batch_index,
                rows_committed,
                ..
            } => {
                assert_eq!(table, "stop_times");
                assert_eq!(batch_index, 1);
                assert_eq!(rows_committed, 1);
            },
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(target.writes().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_table_abandons_progress() {
        let (_dir, feed) = feed_with(&["stops.txt", "stop_times.txt"]);
        let target = RecordingTarget::failing_at(3);
        let progress = EventProgress::default();

        Loader::new(&target, TABLES, &progress, 1).load(&feed).await.unwrap_err();

        assert_eq!(
            progress.events(),
            ["begin stops", "finish", "begin stop_times", "abandon"]
        );
    }

    #[tokio::test]
    async fn test_each_table_finishes_once() {
        let (_dir, feed) = feed_with(&["agency.txt", "stops.txt"]);
        let target = RecordingTarget::default();
        let progress = EventProgress::default();

        Loader::new(&target, TABLES, &progress, 1).load(&feed).await.unwrap();

        assert_eq!(
            progress.events(),
            ["begin agency", "finish", "begin stops", "finish"]
        );
    }

    #[tokio::test]
    async fn test_unknown_columns_and_files() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("stops.txt"),
            "stop_id,stop_name,stop_lat,stop_lon,vendor_color\nS1,Main,45.5,-73.6,red\n",
        )
        .unwrap();
        fs::write(dir.path().join("frequencies.txt"), "trip_id,start_time,end_time,headway_secs\n").unwrap();
        let feed = Feed::open(dir.path()).unwrap();
        let target = RecordingTarget::default();

        let report = Loader::new(&target, TABLES, &NoProgress, 1000).load(&feed).await.unwrap();

        assert_eq!(report.skipped_files, ["frequencies.txt"]);
        assert_eq!(report.table("stops").unwrap().dropped_columns, ["vendor_color"]);
        assert!(!target.writes()[0].sql.contains("vendor_color"));
    }
}
