//! Shared data model, type mapping, error kinds, and driver traits used by every
//! other `icelog-*` crate.

pub mod driver;
pub mod error;
pub mod type_mapper;
pub mod types;

pub use driver::{ColumnDescriptor, MergeOutcome, Row, RowStream, SourceDriver, SqlValue, TargetDriver};
pub use error::{ErrorCode, Result, SyncError};
pub use type_mapper::{map_source_type, ParquetPhysicalType, SourceColumnType};
pub use types::{
    Field, IcebergType, ManifestEntry, ManifestEntryStatus, ManifestListEntry, Schema, Snapshot,
    TableMetadata, Watermark,
};
