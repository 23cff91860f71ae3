//! Sync Coordinator: ties watermark retrieval, extraction, Iceberg append,
//! target merge, and watermark advancement into one cycle.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use icelog_core::driver::{MergeOutcome, Row, SourceDriver, TargetDriver};
use icelog_core::types::{Schema, Watermark};
use icelog_core::Result;

use crate::append;
use crate::change_detector::build_query;
use crate::importer::Importer;
use crate::watermark_store::WatermarkStore;

/// Static per-cycle configuration: which tables to move data between and
/// which columns identify rows and changes.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub source_table: String,
    pub iceberg_table: String,
    pub target_table: String,
    pub primary_key: Vec<String>,
    pub watermark_column: String,
    pub warehouse_path: PathBuf,
    pub watermark_directory: PathBuf,
}

/// The outcome of one coordinator cycle.
#[derive(Debug, Clone)]
pub struct SyncResult {
    pub success: bool,
    pub extracted: u64,
    pub appended: u64,
    pub imported: u64,
    pub inserted: u64,
    pub updated: u64,
    pub new_snapshot_id: Option<i64>,
    pub new_watermark: Option<String>,
    pub duration: Duration,
    pub error_message: Option<String>,
}

impl SyncResult {
    fn no_op() -> Self {
        Self {
            success: true,
            extracted: 0,
            appended: 0,
            imported: 0,
            inserted: 0,
            updated: 0,
            new_snapshot_id: None,
            new_watermark: None,
            duration: Duration::ZERO,
            error_message: None,
        }
    }

    fn failure(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: false,
            extracted: 0,
            appended: 0,
            imported: 0,
            inserted: 0,
            updated: 0,
            new_snapshot_id: None,
            new_watermark: None,
            duration: elapsed,
            error_message: Some(message.into()),
        }
    }
}

/// A cooperative cancellation flag, checked at loop/stage boundaries rather
/// than forcing a thread interrupt.
#[derive(Clone, Default)]
pub struct CancellationToken(std::sync::Arc<std::sync::atomic::AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// One coordinator per Iceberg table is the unit of concurrency;
/// running two coordinators against the same table concurrently is
/// unsupported.
pub struct Coordinator<'a, S: SourceDriver, T: TargetDriver> {
    source: &'a S,
    target: &'a T,
    options: SyncOptions,
}

impl<'a, S: SourceDriver, T: TargetDriver> Coordinator<'a, S, T> {
    pub fn new(source: &'a S, target: &'a T, options: SyncOptions) -> Self {
        Self {
            source,
            target,
            options,
        }
    }

    /// Runs one sync cycle: watermark load, extraction, Iceberg append,
    /// target merge, and watermark advance.
    #[instrument(skip(self, schema_hint, cancellation), fields(table = %self.options.iceberg_table))]
    pub async fn sync(
        &self,
        schema_hint: &Schema,
        cancellation: &CancellationToken,
    ) -> Result<SyncResult> {
        let start = Instant::now();
        let watermark_store = WatermarkStore::new(&self.options.watermark_directory);

        if cancellation.is_cancelled() {
            return Ok(SyncResult::failure("cancelled before extraction", start.elapsed()));
        }

        // Step 1: load prior watermark.
        let prior_watermark = watermark_store.get(&self.options.iceberg_table)?;

        // Step 2-3: build and run the extraction query; compute maxW.
        let query = build_query(
            &self.options.source_table,
            &self.options.watermark_column,
            prior_watermark.as_ref().map(|w| w.last_sync_timestamp.as_str()),
        );
        let delta: Vec<Row> = self
            .source
            .query(&query.sql_text, &query.parameters)
            .await?;

        info!(extracted = delta.len(), "extraction complete");

        // Step 4: empty delta short-circuits without touching Iceberg, target, or watermark.
        if delta.is_empty() {
            return Ok(SyncResult::no_op());
        }

        let max_watermark = max_watermark_value(&delta, &self.options.watermark_column);

        if cancellation.is_cancelled() {
            return Ok(SyncResult::failure("cancelled before iceberg append", start.elapsed()));
        }

        // Step 5: append to the Iceberg log (creates the table on first use).
        let new_snapshot_id = match append::append(
            &self.options.warehouse_path,
            &self.options.iceberg_table,
            schema_hint,
            &delta,
        ) {
            Ok(id) => id,
            Err(e) => return Ok(SyncResult::failure(e.to_string(), start.elapsed())),
        };

        if cancellation.is_cancelled() {
            return Ok(SyncResult::failure("cancelled before target merge", start.elapsed()));
        }

        // Step 6: merge the same delta into the target.
        let importer = Importer::new(self.target);
        let merge_outcome: MergeOutcome = match importer
            .import(&delta, &self.options.target_table, &self.options.primary_key)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => return Ok(SyncResult::failure(e.to_string(), start.elapsed())),
        };

        // Step 7: advance the watermark only now that both prior steps succeeded.
        let watermark = Watermark {
            table_name: self.options.iceberg_table.clone(),
            last_sync_timestamp: max_watermark.clone(),
            last_iceberg_snapshot_id: new_snapshot_id.unwrap_or(-1),
            row_count: delta.len() as i64,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        if let Err(e) = watermark_store.put(&watermark) {
            return Ok(SyncResult::failure(e.to_string(), start.elapsed()));
        }

        Ok(SyncResult {
            success: true,
            extracted: delta.len() as u64,
            appended: delta.len() as u64,
            imported: merge_outcome.rows_imported,
            inserted: merge_outcome.rows_inserted,
            updated: merge_outcome.rows_updated,
            new_snapshot_id,
            new_watermark: Some(max_watermark),
            duration: start.elapsed(),
            error_message: None,
        })
    }
}

fn max_watermark_value(delta: &[Row], watermark_column: &str) -> String {
    delta
        .iter()
        .filter_map(|row| row.get(watermark_column))
        .filter_map(|v| match v {
            icelog_core::driver::SqlValue::Timestamp(s) => Some(s.clone()),
            _ => None,
        })
        .max()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use icelog_core::driver::{ColumnDescriptor, SqlValue};
    use icelog_core::types::{Field, IcebergType};
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn schema() -> Schema {
        Schema::new(
            0,
            vec![
                Field::new(1, "id", true, IcebergType::Int),
                Field::new(2, "modified", true, IcebergType::Timestamp),
            ],
        )
    }

    fn row(id: i32, modified: &str) -> Row {
        let mut r = Row::new();
        r.insert("id".to_string(), SqlValue::I32(id));
        r.insert("modified".to_string(), SqlValue::Timestamp(modified.to_string()));
        r
    }

    /// A source that serves a fixed batch regardless of the query text, so
    /// tests can assert on coordinator behavior rather than SQL shape.
    struct FixedSource(Vec<Row>);

    #[async_trait]
    impl SourceDriver for FixedSource {
        async fn query(&self, _sql: &str, _params: &[SqlValue]) -> Result<Vec<Row>> {
            Ok(self.0.clone())
        }

        async fn describe_table(&self, _table: &str) -> Result<Vec<ColumnDescriptor>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct RecordingTarget {
        merges: Mutex<u32>,
    }

    #[async_trait]
    impl TargetDriver for RecordingTarget {
        async fn bulk_load(&self, _staging_table: &str, _rows: &[Row]) -> Result<()> {
            Ok(())
        }

        async fn merge(
            &self,
            _staging_table: &str,
            _target_table: &str,
            _primary_key: &[String],
        ) -> Result<MergeOutcome> {
            *self.merges.lock().unwrap() += 1;
            Ok(MergeOutcome {
                rows_imported: 2,
                rows_inserted: 2,
                rows_updated: 0,
            })
        }
    }

    fn options(dir: &std::path::Path) -> SyncOptions {
        SyncOptions {
            source_table: "events".to_string(),
            iceberg_table: "events".to_string(),
            target_table: "events".to_string(),
            primary_key: vec!["id".to_string()],
            watermark_column: "modified".to_string(),
            warehouse_path: dir.join("warehouse"),
            watermark_directory: dir.join("watermarks"),
        }
    }

    #[tokio::test]
    async fn empty_delta_is_a_no_op_and_leaves_no_table() {
        let dir = tempdir().unwrap();
        let source = FixedSource(Vec::new());
        let target = RecordingTarget::default();
        let coordinator = Coordinator::new(&source, &target, options(dir.path()));

        let result = coordinator
            .sync(&schema(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.extracted, 0);
        assert_eq!(result.new_snapshot_id, None);
        assert_eq!(*target.merges.lock().unwrap(), 0);
        assert!(!icelog_catalog::FsCatalog::new(dir.path().join("warehouse")).table_exists("events"));
    }

    #[tokio::test]
    async fn non_empty_delta_appends_merges_and_advances_watermark() {
        let dir = tempdir().unwrap();
        let rows = vec![
            row(1, "2026-01-01T00:00:00Z"),
            row(2, "2026-01-02T00:00:00Z"),
        ];
        let source = FixedSource(rows);
        let target = RecordingTarget::default();
        let opts = options(dir.path());
        let coordinator = Coordinator::new(&source, &target, opts.clone());

        let result = coordinator
            .sync(&schema(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.extracted, 2);
        assert!(result.new_snapshot_id.is_some());
        assert_eq!(result.inserted, 2);
        assert_eq!(*target.merges.lock().unwrap(), 1);

        let store = WatermarkStore::new(&opts.watermark_directory);
        let watermark = store.get("events").unwrap().unwrap();
        assert_eq!(watermark.last_sync_timestamp, "2026-01-02T00:00:00Z");
        assert_eq!(watermark.row_count, 2);
    }

    #[tokio::test]
    async fn cancellation_before_extraction_short_circuits() {
        let dir = tempdir().unwrap();
        let source = FixedSource(vec![row(1, "2026-01-01T00:00:00Z")]);
        let target = RecordingTarget::default();
        let token = CancellationToken::new();
        token.cancel();
        let coordinator = Coordinator::new(&source, &target, options(dir.path()));

        let result = coordinator.sync(&schema(), &token).await.unwrap();

        assert!(!result.success);
        assert_eq!(*target.merges.lock().unwrap(), 0);
    }
}
