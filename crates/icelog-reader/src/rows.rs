//! Lazy, forward-only row iterator over a list of data files, transposing
//! each file's columnar row groups back into row maps.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs::File;
use std::path::PathBuf;

use arrow::array::{
    Array, BinaryArray, BooleanArray, Date32Array, Decimal128Array, FixedSizeBinaryArray,
    Float32Array, Float64Array, Int32Array, Int64Array, StringArray, TimestampMicrosecondArray,
};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use icelog_core::driver::{Row, SqlValue};
use icelog_core::error::SyncError;
use icelog_core::types::{IcebergType, Schema};
use icelog_core::Result;
use icelog_parquet::field_id_of;

/// Streams rows out of a fixed list of Parquet files, one file open at a
/// time. Only the current file's row groups are buffered in memory.
pub struct TableRowIter {
    schema: Schema,
    pending_files: VecDeque<PathBuf>,
    current_rows: VecDeque<Row>,
}

impl TableRowIter {
    pub(crate) fn new(schema: Schema, files: Vec<PathBuf>) -> Self {
        Self {
            schema,
            pending_files: files.into(),
            current_rows: VecDeque::new(),
        }
    }

    fn load_next_file(&mut self) -> Result<bool> {
        let Some(path) = self.pending_files.pop_front() else {
            return Ok(false);
        };
        let file = File::open(&path).map_err(SyncError::Io)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| SyncError::ParquetWriteFailed { source: e.into() })?
            .build()
            .map_err(|e| SyncError::ParquetWriteFailed { source: e.into() })?;

        for batch in reader {
            let batch = batch.map_err(|e| SyncError::ParquetWriteFailed { source: e.into() })?;
            self.current_rows.extend(rows_from_batch(&self.schema, &batch)?);
        }
        Ok(true)
    }
}

impl Iterator for TableRowIter {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.current_rows.pop_front() {
                return Some(Ok(row));
            }
            match self.load_next_file() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Builds a column-index lookup keyed by Iceberg field-id, so values are
/// located by stable id rather than by column name.
fn field_id_columns(batch: &RecordBatch) -> HashMap<i32, usize> {
    batch
        .schema()
        .fields()
        .iter()
        .enumerate()
        .filter_map(|(idx, field)| field_id_of(field).map(|id| (id, idx)))
        .collect()
}

fn rows_from_batch(schema: &Schema, batch: &RecordBatch) -> Result<Vec<Row>> {
    let columns_by_id = field_id_columns(batch);
    let mut rows = Vec::with_capacity(batch.num_rows());
    for row_idx in 0..batch.num_rows() {
        let mut row: Row = BTreeMap::new();
        for field in &schema.fields {
            let Some(&col_idx) = columns_by_id.get(&field.id) else {
                continue;
            };
            let array = batch.column(col_idx);
            let value = extract_value(array.as_ref(), row_idx, &field.field_type)?;
            row.insert(field.name.clone(), value);
        }
        rows.push(row);
    }
    Ok(rows)
}

fn extract_value(
    array: &dyn Array,
    row_idx: usize,
    field_type: &IcebergType,
) -> Result<SqlValue> {
    if array.is_null(row_idx) {
        return Ok(SqlValue::Null);
    }
    let value = match field_type {
        IcebergType::Int => SqlValue::I32(downcast::<Int32Array>(array)?.value(row_idx)),
        IcebergType::Long => SqlValue::I64(downcast::<Int64Array>(array)?.value(row_idx)),
        IcebergType::Boolean => SqlValue::Bool(downcast::<BooleanArray>(array)?.value(row_idx)),
        IcebergType::Float => SqlValue::F32(downcast::<Float32Array>(array)?.value(row_idx)),
        IcebergType::Double => SqlValue::F64(downcast::<Float64Array>(array)?.value(row_idx)),
        IcebergType::Decimal { precision, scale } => {
            let unscaled = downcast::<Decimal128Array>(array)?.value(row_idx);
            SqlValue::Decimal(unscaled, *precision, *scale)
        }
        IcebergType::Date => SqlValue::I32(downcast::<Date32Array>(array)?.value(row_idx)),
        IcebergType::Timestamp | IcebergType::Timestamptz => {
            let micros = downcast::<TimestampMicrosecondArray>(array)?.value(row_idx);
            SqlValue::Timestamp(micros_to_rfc3339(micros)?)
        }
        IcebergType::String => {
            SqlValue::String(downcast::<StringArray>(array)?.value(row_idx).to_string())
        }
        IcebergType::Binary => {
            SqlValue::Binary(downcast::<BinaryArray>(array)?.value(row_idx).to_vec())
        }
        IcebergType::Uuid => SqlValue::Binary(
            downcast::<FixedSizeBinaryArray>(array)?
                .value(row_idx)
                .to_vec(),
        ),
    };
    Ok(value)
}

/// Converts microseconds-since-epoch back to the RFC 3339 text form
/// [`icelog_parquet::write_data_file`] accepts as `SqlValue::Timestamp`, so a
/// round trip through write-then-read yields an equal value, not just an
/// equivalent instant in a different representation.
fn micros_to_rfc3339(micros: i64) -> Result<String> {
    chrono::DateTime::from_timestamp_micros(micros)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
        .ok_or_else(|| SyncError::ParquetWriteFailed {
            source: anyhow::anyhow!("timestamp value {micros} out of range"),
        })
}

fn downcast<T: 'static>(array: &dyn Array) -> Result<&T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| SyncError::ParquetWriteFailed {
            source: anyhow::anyhow!("column array type mismatch during read"),
        })
}
