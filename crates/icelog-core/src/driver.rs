//! Database driver traits the core issues parameterised SQL through.
//!
//! An async-trait abstraction: the sync engine never talks to a concrete
//! database crate directly, so the same coordinator code drives any engine
//! with an adapter, and the test suite drives it with an in-memory double
//! instead of a live database.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;

/// A scalar value as it flows between the source/target drivers and the
/// sync engine. `Timestamp` is stored as RFC 3339 text so watermark
/// comparisons are simple string/lexicographic comparisons over a
/// zero-padded format, matching how the reference watermark store persists it.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Binary(Vec<u8>),
    Timestamp(String),
    /// Unscaled i128 value plus (precision, scale), matching Parquet's
    /// `FIXED_LEN_BYTE_ARRAY` decimal encoding.
    Decimal(i128, u32, u32),
}

/// One extracted row: column name to value. Ordering of keys is irrelevant;
/// the schema is the source of column order.
pub type Row = BTreeMap<String, SqlValue>;

/// A column as reported by `SourceDriver::describe_table`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub source_type: crate::type_mapper::SourceColumnType,
    pub nullable: bool,
}

/// The outcome of a `TargetDriver::merge` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOutcome {
    pub rows_imported: u64,
    pub rows_inserted: u64,
    pub rows_updated: u64,
}

/// A forward-only stream of extracted rows. The core never rewinds it.
pub type RowStream = Vec<Row>;

/// The source side of a sync cycle: parameterised query execution and
/// column introspection for first-load schema inference.
#[async_trait]
pub trait SourceDriver: Send + Sync {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<RowStream>;
    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnDescriptor>>;
}

/// The target side: bulk-load into staging, then a set-based upsert merge.
#[async_trait]
pub trait TargetDriver: Send + Sync {
    async fn bulk_load(&self, staging_table: &str, rows: &[Row]) -> Result<()>;
    async fn merge(
        &self,
        staging_table: &str,
        target_table: &str,
        primary_key: &[String],
    ) -> Result<MergeOutcome>;
}
