//! JSON-fixture-backed `SourceDriver`/`TargetDriver` pair.
//!
//! Production database adapters are out of scope for the core; this pair
//! exists so `icelog sync` is runnable against a plain file on disk
//! instead of a live database.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use icelog_core::driver::{ColumnDescriptor, MergeOutcome, Row, SourceDriver, SqlValue, TargetDriver};
use icelog_core::error::SyncError;
use icelog_core::types::{Field, IcebergType, Schema};
use icelog_core::Result;

pub struct JsonFileSourceDriver {
    path: PathBuf,
    watermark_column: String,
}

impl JsonFileSourceDriver {
    pub fn new(path: impl Into<PathBuf>, watermark_column: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            watermark_column: watermark_column.into(),
        }
    }

    fn read_rows(&self) -> Result<Vec<Row>> {
        if !self.path.is_file() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path).map_err(SyncError::Io)?;
        let values: Vec<BTreeMap<String, JsonValue>> = serde_json::from_str(&text)
            .map_err(|e| SyncError::SourceQueryFailed { source: e.into() })?;
        Ok(values
            .into_iter()
            .map(|obj| json_object_to_row(obj, &self.watermark_column))
            .collect())
    }
}

#[async_trait]
impl SourceDriver for JsonFileSourceDriver {
    async fn query(&self, _sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        let rows = self.read_rows()?;
        let Some(SqlValue::Timestamp(watermark)) = params.first() else {
            return Ok(rows);
        };
        Ok(rows
            .into_iter()
            .filter(|row| match row.get(&self.watermark_column) {
                Some(SqlValue::Timestamp(ts)) => ts > watermark,
                _ => false,
            })
            .collect())
    }

    async fn describe_table(&self, _table: &str) -> Result<Vec<ColumnDescriptor>> {
        Ok(Vec::new())
    }
}

pub struct JsonFileTargetDriver {
    path: PathBuf,
    staging: Mutex<Vec<Row>>,
}

impl JsonFileTargetDriver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            staging: Mutex::new(Vec::new()),
        }
    }

    fn read_target(&self) -> Result<Vec<Row>> {
        if !self.path.is_file() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path).map_err(SyncError::Io)?;
        let values: Vec<BTreeMap<String, JsonValue>> = serde_json::from_str(&text)
            .map_err(|e| SyncError::TargetMergeFailed { detail: e.to_string() })?;
        Ok(values
            .into_iter()
            .map(|obj| json_object_to_row(obj, ""))
            .collect())
    }

    fn write_target(&self, rows: &[Row]) -> Result<()> {
        let values: Vec<BTreeMap<String, JsonValue>> =
            rows.iter().map(|r| row_to_json_object(r)).collect();
        let text = serde_json::to_string_pretty(&values)
            .map_err(|e| SyncError::TargetMergeFailed { detail: e.to_string() })?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(SyncError::Io)?;
        }
        std::fs::write(&self.path, text).map_err(SyncError::Io)
    }
}

#[async_trait]
impl TargetDriver for JsonFileTargetDriver {
    async fn bulk_load(&self, _staging_table: &str, rows: &[Row]) -> Result<()> {
        self.staging.lock().unwrap().extend_from_slice(rows);
        Ok(())
    }

    async fn merge(
        &self,
        _staging_table: &str,
        _target_table: &str,
        primary_key: &[String],
    ) -> Result<MergeOutcome> {
        let staged = std::mem::take(&mut *self.staging.lock().unwrap());
        let mut target = self.read_target()?;

        let mut inserted = 0u64;
        let mut updated = 0u64;

        for incoming in staged {
            let key = |row: &Row| -> Vec<Option<SqlValue>> {
                primary_key.iter().map(|k| row.get(k).cloned()).collect()
            };
            let incoming_key = key(&incoming);
            if let Some(existing) = target.iter_mut().find(|row| key(row) == incoming_key) {
                *existing = incoming;
                updated += 1;
            } else {
                target.push(incoming);
                inserted += 1;
            }
        }

        self.write_target(&target)?;

        Ok(MergeOutcome {
            rows_imported: inserted + updated,
            rows_inserted: inserted,
            rows_updated: updated,
        })
    }
}

fn json_object_to_row(obj: BTreeMap<String, JsonValue>, watermark_column: &str) -> Row {
    obj.into_iter()
        .map(|(key, value)| {
            let sql_value = if key == watermark_column {
                match value {
                    JsonValue::String(s) => SqlValue::Timestamp(s),
                    JsonValue::Null => SqlValue::Null,
                    other => SqlValue::Timestamp(other.to_string()),
                }
            } else {
                json_scalar_to_sql_value(value)
            };
            (key, sql_value)
        })
        .collect()
}

fn json_scalar_to_sql_value(value: JsonValue) -> SqlValue {
    match value {
        JsonValue::Null => SqlValue::Null,
        JsonValue::Bool(b) => SqlValue::Bool(b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::I64(i)
            } else {
                SqlValue::F64(n.as_f64().unwrap_or_default())
            }
        }
        JsonValue::String(s) => SqlValue::String(s),
        other => SqlValue::String(other.to_string()),
    }
}

fn row_to_json_object(row: &Row) -> BTreeMap<String, JsonValue> {
    row.iter()
        .map(|(key, value)| (key.clone(), sql_value_to_json(value)))
        .collect()
}

fn sql_value_to_json(value: &SqlValue) -> JsonValue {
    match value {
        SqlValue::Null => JsonValue::Null,
        SqlValue::Bool(b) => JsonValue::Bool(*b),
        SqlValue::I32(v) => JsonValue::from(*v),
        SqlValue::I64(v) => JsonValue::from(*v),
        SqlValue::F32(v) => JsonValue::from(*v),
        SqlValue::F64(v) => JsonValue::from(*v),
        SqlValue::String(v) => JsonValue::String(v.clone()),
        SqlValue::Binary(v) => JsonValue::String(hex::encode(v)),
        SqlValue::Timestamp(v) => JsonValue::String(v.clone()),
        SqlValue::Decimal(unscaled, _, _) => JsonValue::from(*unscaled as f64),
    }
}

/// Infers a single-snapshot-schema from one representative row: every
/// column becomes a required field, typed off its `SqlValue` variant, with
/// `watermark_column` forced to `Timestamp`. Field ids are assigned in
/// column order starting at 1.
pub fn infer_schema(row: &Row, watermark_column: &str) -> Schema {
    let fields = row
        .iter()
        .enumerate()
        .map(|(i, (name, value))| {
            let field_type = if name == watermark_column {
                IcebergType::Timestamp
            } else {
                match value {
                    SqlValue::Bool(_) => IcebergType::Boolean,
                    SqlValue::I32(_) => IcebergType::Int,
                    SqlValue::I64(_) => IcebergType::Long,
                    SqlValue::F32(_) => IcebergType::Float,
                    SqlValue::F64(_) => IcebergType::Double,
                    SqlValue::Binary(_) => IcebergType::Binary,
                    SqlValue::Timestamp(_) => IcebergType::Timestamp,
                    SqlValue::Decimal(_, p, s) => IcebergType::Decimal {
                        precision: *p,
                        scale: *s,
                    },
                    SqlValue::Null | SqlValue::String(_) => IcebergType::String,
                }
            };
            Field::new(i as i32 + 1, name.clone(), true, field_type)
        })
        .collect();
    Schema::new(0, fields)
}

pub fn fixture_path(warehouse: &Path, table: &str) -> PathBuf {
    warehouse.join(".fixtures").join(format!("{table}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_fixture(path: &Path, json: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, json).unwrap();
    }

    #[tokio::test]
    async fn source_driver_filters_rows_at_or_before_the_watermark() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("orders.json");
        write_fixture(
            &path,
            r#"[
                {"id": 1, "modified": "2026-01-01T00:00:00Z"},
                {"id": 2, "modified": "2026-01-02T00:00:00Z"}
            ]"#,
        );
        let source = JsonFileSourceDriver::new(&path, "modified");

        let full = source.query("ignored", &[]).await.unwrap();
        assert_eq!(full.len(), 2);

        let delta = source
            .query("ignored", &[SqlValue::Timestamp("2026-01-01T00:00:00Z".to_string())])
            .await
            .unwrap();
        assert_eq!(delta.len(), 1, "row at exactly the watermark must be excluded");
    }

    #[tokio::test]
    async fn source_driver_missing_file_yields_no_rows() {
        let dir = tempdir().unwrap();
        let source = JsonFileSourceDriver::new(dir.path().join("missing.json"), "modified");
        assert!(source.query("ignored", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn target_driver_inserts_then_updates_by_primary_key() {
        let dir = tempdir().unwrap();
        let target = JsonFileTargetDriver::new(dir.path().join("orders.target.json"));
        let pk = vec!["id".to_string()];

        let mut row1 = Row::new();
        row1.insert("id".to_string(), SqlValue::I32(1));
        row1.insert("name".to_string(), SqlValue::String("first".to_string()));
        target.bulk_load("staging", &[row1]).await.unwrap();
        let outcome = target.merge("staging", "orders", &pk).await.unwrap();
        assert_eq!(outcome.rows_inserted, 1);
        assert_eq!(outcome.rows_updated, 0);

        let mut row1_updated = Row::new();
        row1_updated.insert("id".to_string(), SqlValue::I32(1));
        row1_updated.insert("name".to_string(), SqlValue::String("renamed".to_string()));
        target.bulk_load("staging", &[row1_updated]).await.unwrap();
        let outcome = target.merge("staging", "orders", &pk).await.unwrap();
        assert_eq!(outcome.rows_inserted, 0);
        assert_eq!(outcome.rows_updated, 1);
    }

    #[test]
    fn infer_schema_forces_the_watermark_column_to_timestamp() {
        let mut row = Row::new();
        row.insert("id".to_string(), SqlValue::I32(1));
        row.insert("modified".to_string(), SqlValue::String("not-a-timestamp-yet".to_string()));

        let schema = infer_schema(&row, "modified");
        let field = schema.field_by_name("modified").unwrap();
        assert_eq!(field.field_type, IcebergType::Timestamp);
    }
}
