//! Error kinds shared across the sync pipeline, with a machine-readable code
//! per variant for log correlation.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SyncError>;

/// A stable, machine-readable error code, stitched into log lines so a
/// failure can be grepped across a fleet without parsing the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    UnsupportedType,
    TableNotFound,
    UnknownSnapshot,
    SchemaMismatch,
    IcebergCommitFailed,
    ParquetWriteFailed,
    AvroWriteFailed,
    SourceQueryFailed,
    TargetBulkLoadFailed,
    TargetMergeFailed,
    WatermarkIoFailure,
    Cancelled,
    IoFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UnsupportedType => "E001",
            ErrorCode::TableNotFound => "E002",
            ErrorCode::UnknownSnapshot => "E003",
            ErrorCode::SchemaMismatch => "E004",
            ErrorCode::IcebergCommitFailed => "E005",
            ErrorCode::ParquetWriteFailed => "E006",
            ErrorCode::AvroWriteFailed => "E007",
            ErrorCode::SourceQueryFailed => "E008",
            ErrorCode::TargetBulkLoadFailed => "E009",
            ErrorCode::TargetMergeFailed => "E010",
            ErrorCode::WatermarkIoFailure => "E011",
            ErrorCode::Cancelled => "E012",
            ErrorCode::IoFailure => "E013",
        }
    }
}

/// The error kinds the sync pipeline can return, each carrying enough
/// context (table name, stage) to render a useful message on its own.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("[{code}] unsupported source column type: {detail}", code = ErrorCode::UnsupportedType.as_str())]
    UnsupportedType { detail: String },

    #[error("[{code}] table not found: {table}", code = ErrorCode::TableNotFound.as_str())]
    TableNotFound { table: String },

    #[error("[{code}] unknown snapshot {snapshot_id} for table {table}", code = ErrorCode::UnknownSnapshot.as_str())]
    UnknownSnapshot { table: String, snapshot_id: i64 },

    #[error("[{code}] schema mismatch for table {table}: {detail}", code = ErrorCode::SchemaMismatch.as_str())]
    SchemaMismatch { table: String, detail: String },

    #[error("[{code}] iceberg commit failed for table {table}: {source}", code = ErrorCode::IcebergCommitFailed.as_str())]
    IcebergCommitFailed {
        table: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("[{code}] parquet write failed: {source}", code = ErrorCode::ParquetWriteFailed.as_str())]
    ParquetWriteFailed {
        #[source]
        source: anyhow::Error,
    },

    #[error("[{code}] avro write failed: {source}", code = ErrorCode::AvroWriteFailed.as_str())]
    AvroWriteFailed {
        #[source]
        source: anyhow::Error,
    },

    #[error("[{code}] source query failed: {source}", code = ErrorCode::SourceQueryFailed.as_str())]
    SourceQueryFailed {
        #[source]
        source: anyhow::Error,
    },

    #[error("[{code}] target bulk load failed: {source}", code = ErrorCode::TargetBulkLoadFailed.as_str())]
    TargetBulkLoadFailed {
        #[source]
        source: anyhow::Error,
    },

    #[error("[{code}] target merge failed: {detail}", code = ErrorCode::TargetMergeFailed.as_str())]
    TargetMergeFailed { detail: String },

    #[error("[{code}] watermark I/O failed for table {table}: {source}", code = ErrorCode::WatermarkIoFailure.as_str())]
    WatermarkIoFailure {
        table: String,
        #[source]
        source: std::io::Error,
    },

    #[error("[{code}] cancelled", code = ErrorCode::Cancelled.as_str())]
    Cancelled,

    #[error("[{code}] I/O error: {0}", code = ErrorCode::IoFailure.as_str())]
    Io(#[from] std::io::Error),
}

impl SyncError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SyncError::UnsupportedType { .. } => ErrorCode::UnsupportedType,
            SyncError::TableNotFound { .. } => ErrorCode::TableNotFound,
            SyncError::UnknownSnapshot { .. } => ErrorCode::UnknownSnapshot,
            SyncError::SchemaMismatch { .. } => ErrorCode::SchemaMismatch,
            SyncError::IcebergCommitFailed { .. } => ErrorCode::IcebergCommitFailed,
            SyncError::ParquetWriteFailed { .. } => ErrorCode::ParquetWriteFailed,
            SyncError::AvroWriteFailed { .. } => ErrorCode::AvroWriteFailed,
            SyncError::SourceQueryFailed { .. } => ErrorCode::SourceQueryFailed,
            SyncError::TargetBulkLoadFailed { .. } => ErrorCode::TargetBulkLoadFailed,
            SyncError::TargetMergeFailed { .. } => ErrorCode::TargetMergeFailed,
            SyncError::WatermarkIoFailure { .. } => ErrorCode::WatermarkIoFailure,
            SyncError::Cancelled => ErrorCode::Cancelled,
            SyncError::Io(_) => ErrorCode::IoFailure,
        }
    }
}
