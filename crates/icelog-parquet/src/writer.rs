//! Writes one Parquet data file per append batch, using the field-id-bearing
//! Arrow schema from [`crate::schema`].

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BinaryBuilder, BooleanBuilder, Date32Builder, Decimal128Builder,
    FixedSizeBinaryBuilder, Float32Builder, Float64Builder, Int32Builder, Int64Builder,
    StringBuilder, TimestampMicrosecondBuilder,
};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;

use icelog_core::driver::{Row, SqlValue};
use icelog_core::error::SyncError;
use icelog_core::types::IcebergType;
use icelog_core::{Result, Schema as IcebergSchema};

use crate::schema::{arrow_schema_with_field_ids, field_id_of};

/// Per-column null-count plus min/max, computed over the batch written to
/// one data file.
#[derive(Debug, Clone, Default)]
pub struct ColumnStats {
    pub null_count: i64,
    pub min: Option<SqlValue>,
    pub max: Option<SqlValue>,
}

/// Per-file metadata returned after a successful write.
#[derive(Debug, Clone)]
pub struct DataFileMetadata {
    pub path: String,
    pub size_bytes: i64,
    pub record_count: i64,
    pub column_stats: std::collections::BTreeMap<String, ColumnStats>,
}

fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::try_new(3).unwrap()))
        .build()
}

/// Suggested row-group size threshold: 100k rows.
const ROW_GROUP_SIZE_HINT: usize = 100_000;

fn build_column(field_name: &str, field_type: &IcebergType, rows: &[Row]) -> Result<ArrayRef> {
    let get = |row: &Row| row.get(field_name).cloned().unwrap_or(SqlValue::Null);

    let array: ArrayRef = match field_type {
        IcebergType::Int => {
            let mut b = Int32Builder::with_capacity(rows.len());
            for row in rows {
                match get(row) {
                    SqlValue::Null => b.append_null(),
                    SqlValue::I32(v) => b.append_value(v),
                    SqlValue::I64(v) => b.append_value(v as i32),
                    other => return Err(type_error(field_name, "int", other)),
                }
            }
            Arc::new(b.finish())
        }
        IcebergType::Long => {
            let mut b = Int64Builder::with_capacity(rows.len());
            for row in rows {
                match get(row) {
                    SqlValue::Null => b.append_null(),
                    SqlValue::I64(v) => b.append_value(v),
                    SqlValue::I32(v) => b.append_value(v as i64),
                    other => return Err(type_error(field_name, "long", other)),
                }
            }
            Arc::new(b.finish())
        }
        IcebergType::Boolean => {
            let mut b = BooleanBuilder::with_capacity(rows.len());
            for row in rows {
                match get(row) {
                    SqlValue::Null => b.append_null(),
                    SqlValue::Bool(v) => b.append_value(v),
                    other => return Err(type_error(field_name, "boolean", other)),
                }
            }
            Arc::new(b.finish())
        }
        IcebergType::Float => {
            let mut b = Float32Builder::with_capacity(rows.len());
            for row in rows {
                match get(row) {
                    SqlValue::Null => b.append_null(),
                    SqlValue::F32(v) => b.append_value(v),
                    other => return Err(type_error(field_name, "float", other)),
                }
            }
            Arc::new(b.finish())
        }
        IcebergType::Double => {
            let mut b = Float64Builder::with_capacity(rows.len());
            for row in rows {
                match get(row) {
                    SqlValue::Null => b.append_null(),
                    SqlValue::F64(v) => b.append_value(v),
                    SqlValue::F32(v) => b.append_value(v as f64),
                    other => return Err(type_error(field_name, "double", other)),
                }
            }
            Arc::new(b.finish())
        }
        IcebergType::Decimal { precision, scale } => {
            let mut b = Decimal128Builder::with_capacity(rows.len())
                .with_precision_and_scale(*precision as u8, *scale as i8)
                .map_err(|e| SyncError::ParquetWriteFailed { source: e.into() })?;
            for row in rows {
                match get(row) {
                    SqlValue::Null => b.append_null(),
                    SqlValue::I64(v) => b.append_value(v as i128),
                    SqlValue::Decimal(unscaled, _, _) => b.append_value(unscaled),
                    SqlValue::F64(v) => {
                        b.append_value((v * 10f64.powi(*scale as i32)).round() as i128)
                    }
                    other => return Err(type_error(field_name, "decimal", other)),
                }
            }
            Arc::new(b.finish())
        }
        IcebergType::Date => {
            let mut b = Date32Builder::with_capacity(rows.len());
            for row in rows {
                match get(row) {
                    SqlValue::Null => b.append_null(),
                    SqlValue::I32(v) => b.append_value(v),
                    other => return Err(type_error(field_name, "date", other)),
                }
            }
            Arc::new(b.finish())
        }
        IcebergType::Timestamp | IcebergType::Timestamptz => {
            let mut b = TimestampMicrosecondBuilder::with_capacity(rows.len());
            for row in rows {
                match get(row) {
                    SqlValue::Null => b.append_null(),
                    SqlValue::I64(v) => b.append_value(v),
                    SqlValue::Timestamp(text) => {
                        let micros = chrono::DateTime::parse_from_rfc3339(&text)
                            .map_err(|e| SyncError::ParquetWriteFailed { source: e.into() })?
                            .timestamp_micros();
                        b.append_value(micros)
                    }
                    other => return Err(type_error(field_name, "timestamp", other)),
                }
            }
            Arc::new(b.finish())
        }
        IcebergType::String => {
            let mut b = StringBuilder::new();
            for row in rows {
                match get(row) {
                    SqlValue::Null => b.append_null(),
                    SqlValue::String(v) => b.append_value(v),
                    other => return Err(type_error(field_name, "string", other)),
                }
            }
            Arc::new(b.finish())
        }
        IcebergType::Binary => {
            let mut b = BinaryBuilder::new();
            for row in rows {
                match get(row) {
                    SqlValue::Null => b.append_null(),
                    SqlValue::Binary(v) => b.append_value(v),
                    other => return Err(type_error(field_name, "binary", other)),
                }
            }
            Arc::new(b.finish())
        }
        IcebergType::Uuid => {
            let mut b = FixedSizeBinaryBuilder::new(16);
            for row in rows {
                match get(row) {
                    SqlValue::Null => {
                        b.append_null();
                    }
                    SqlValue::Binary(v) => b
                        .append_value(v)
                        .map_err(|e| SyncError::ParquetWriteFailed { source: e.into() })?,
                    other => return Err(type_error(field_name, "uuid", other)),
                }
            }
            Arc::new(b.finish())
        }
    };
    Ok(array)
}

fn type_error(field_name: &str, expected: &str, got: SqlValue) -> SyncError {
    SyncError::SchemaMismatch {
        table: String::new(),
        detail: format!("field {field_name} expected {expected}, got {got:?}"),
    }
}

/// Writes `rows` to a new Parquet file at `path`, using `schema`'s field ids.
///
/// A zero-row batch still produces a valid (header + footer, no row groups)
/// file; callers implementing the append flow skip recording such a file
/// rather than committing an empty data file with no rows.
pub fn write_data_file(
    path: &Path,
    schema: &IcebergSchema,
    rows: &[Row],
) -> Result<DataFileMetadata> {
    let arrow_schema = Arc::new(arrow_schema_with_field_ids(schema));
    let file = File::create(path).map_err(SyncError::Io)?;
    let mut writer = ArrowWriter::try_new(file, arrow_schema.clone(), Some(writer_properties()))
        .map_err(|e| SyncError::ParquetWriteFailed { source: e.into() })?;

    for chunk in rows.chunks(ROW_GROUP_SIZE_HINT.max(1)) {
        let columns = arrow_schema
            .fields()
            .iter()
            .map(|f| build_column(f.name(), &field_type_of(schema, f.name()), chunk))
            .collect::<Result<Vec<_>>>()?;
        let batch = RecordBatch::try_new(arrow_schema.clone(), columns)
            .map_err(|e| SyncError::ParquetWriteFailed { source: e.into() })?;
        writer
            .write(&batch)
            .map_err(|e| SyncError::ParquetWriteFailed { source: e.into() })?;
    }

    writer
        .close()
        .map_err(|e| SyncError::ParquetWriteFailed { source: e.into() })?;

    assert_field_ids_round_trip(path, schema.fields.len())?;

    let size_bytes = std::fs::metadata(path).map_err(SyncError::Io)?.len() as i64;
    let column_stats = schema
        .fields
        .iter()
        .map(|f| (f.name.clone(), column_stats(&f.field_type, rows, &f.name)))
        .collect();

    Ok(DataFileMetadata {
        path: path.to_string_lossy().into_owned(),
        size_bytes,
        record_count: rows.len() as i64,
        column_stats,
    })
}

fn field_type_of(schema: &IcebergSchema, name: &str) -> IcebergType {
    schema
        .field_by_name(name)
        .map(|f| f.field_type.clone())
        .expect("arrow schema fields are derived from the iceberg schema")
}

/// The writer's self-test: re-opens the file just
/// written and confirms every leaf column carries its Iceberg field-id.
/// A file that fails this check is non-compliant and must not be returned
/// to the caller as a usable data file.
fn assert_field_ids_round_trip(path: &Path, expected_fields: usize) -> Result<()> {
    let file = File::open(path).map_err(SyncError::Io)?;
    let builder = parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| SyncError::ParquetWriteFailed { source: e.into() })?;
    let fields = builder.schema().fields();
    if fields.len() != expected_fields {
        return Err(SyncError::ParquetWriteFailed {
            source: anyhow::anyhow!("self-test: expected {expected_fields} leaf columns, found {}", fields.len()),
        });
    }
    for field in fields.iter() {
        if field_id_of(field).is_none() {
            return Err(SyncError::ParquetWriteFailed {
                source: anyhow::anyhow!("self-test: column '{}' was written without an Iceberg field-id", field.name()),
            });
        }
    }
    Ok(())
}

/// Computes null-count plus min/max for one column over the batch just
/// written. Min/max comparisons are intra-variant only, matching the
/// variant `field_type` implies; a stray mismatched value (which
/// `build_column` would already have rejected) is skipped rather than
/// panicking.
fn column_stats(field_type: &IcebergType, rows: &[Row], field_name: &str) -> ColumnStats {
    let mut stats = ColumnStats::default();
    for row in rows {
        match row.get(field_name) {
            None | Some(SqlValue::Null) => stats.null_count += 1,
            Some(value) => {
                let is_new_min = match &stats.min {
                    None => true,
                    Some(m) => sql_value_lt(value, m, field_type),
                };
                if is_new_min {
                    stats.min = Some(value.clone());
                }
                let is_new_max = match &stats.max {
                    None => true,
                    Some(m) => sql_value_lt(m, value, field_type),
                };
                if is_new_max {
                    stats.max = Some(value.clone());
                }
            }
        }
    }
    stats
}

/// `a < b`, compared the way the field's Iceberg type implies — numeric
/// comparison for numbers, lexicographic for the RFC 3339 text a
/// `Timestamp` carries (which sorts correctly because the format is
/// fixed-width and zero-padded), byte comparison otherwise.
fn sql_value_lt(a: &SqlValue, b: &SqlValue, field_type: &IcebergType) -> bool {
    match (a, b, field_type) {
        (SqlValue::I32(x), SqlValue::I32(y), _) => x < y,
        (SqlValue::I64(x), SqlValue::I64(y), _) => x < y,
        (SqlValue::F32(x), SqlValue::F32(y), _) => x < y,
        (SqlValue::F64(x), SqlValue::F64(y), _) => x < y,
        (SqlValue::Decimal(x, ..), SqlValue::Decimal(y, ..), _) => x < y,
        (SqlValue::Timestamp(x), SqlValue::Timestamp(y), _) => x < y,
        (SqlValue::String(x), SqlValue::String(y), _) => x < y,
        (SqlValue::Binary(x), SqlValue::Binary(y), _) => x < y,
        (SqlValue::Bool(x), SqlValue::Bool(y), _) => !x & y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use icelog_core::Field as IField;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn sample_schema() -> IcebergSchema {
        IcebergSchema::new(
            0,
            vec![
                IField::new(1, "id", true, IcebergType::Int),
                IField::new(2, "name", false, IcebergType::String),
            ],
        )
    }

    fn row(id: i32, name: Option<&str>) -> Row {
        let mut r = BTreeMap::new();
        r.insert("id".to_string(), SqlValue::I32(id));
        r.insert(
            "name".to_string(),
            name.map(|n| SqlValue::String(n.to_string()))
                .unwrap_or(SqlValue::Null),
        );
        r
    }

    #[test]
    fn writes_a_file_with_the_requested_record_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data-0001.parquet");
        let rows = vec![row(1, Some("a")), row(2, None)];
        let meta = write_data_file(&path, &sample_schema(), &rows).unwrap();
        assert_eq!(meta.record_count, 2);
        assert!(meta.size_bytes > 0);
        assert!(path.exists());
    }

    #[test]
    fn empty_batch_still_produces_a_readable_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data-empty.parquet");
        let meta = write_data_file(&path, &sample_schema(), &[]).unwrap();
        assert_eq!(meta.record_count, 0);
    }

    #[test]
    fn column_stats_report_null_count_and_min_max() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data-stats.parquet");
        let rows = vec![row(3, Some("b")), row(1, None), row(2, Some("a"))];
        let meta = write_data_file(&path, &sample_schema(), &rows).unwrap();

        let id_stats = &meta.column_stats["id"];
        assert_eq!(id_stats.null_count, 0);
        assert_eq!(id_stats.min, Some(SqlValue::I32(1)));
        assert_eq!(id_stats.max, Some(SqlValue::I32(3)));

        let name_stats = &meta.column_stats["name"];
        assert_eq!(name_stats.null_count, 1);
        assert_eq!(name_stats.min, Some(SqlValue::String("a".to_string())));
        assert_eq!(name_stats.max, Some(SqlValue::String("b".to_string())));
    }

    #[test]
    fn written_file_passes_the_field_id_self_test() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data-selftest.parquet");
        write_data_file(&path, &sample_schema(), &[row(1, Some("a"))]).unwrap();
        assert_field_ids_round_trip(&path, 2).unwrap();
    }
}
