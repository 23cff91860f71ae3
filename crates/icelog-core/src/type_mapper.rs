//! Pure, side-effect-free mapping from source SQL column descriptors to
//! Iceberg types and their Parquet physical representation.

use crate::error::Result;
use crate::types::IcebergType;

/// A source database's column type, described generically enough to cover
/// the common relational engines without depending on any one driver crate.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceColumnType {
    SmallInt,
    Int,
    BigInt,
    Boolean,
    Real,
    DoublePrecision,
    Decimal { precision: u32, scale: u32 },
    Date,
    Timestamp,
    TimestampWithTimeZone,
    Char(u32),
    VarChar(u32),
    Text,
    Binary,
    VarBinary,
    Uuid,
}

/// The Parquet physical type a mapped Iceberg type is written as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParquetPhysicalType {
    Int32,
    Int64,
    Boolean,
    Float,
    Double,
    FixedLenByteArray(i32),
    ByteArray,
}

/// Maps a source column descriptor to `(Iceberg type, Parquet physical type)`.
///
/// [`SourceColumnType`] only enumerates the column kinds this table covers,
/// so every variant maps successfully; a concrete driver's `describe_table`
/// is where an unrecognized vendor type name would be rejected with
/// [`crate::error::SyncError::UnsupportedType`] before it ever reaches this function.
pub fn map_source_type(source: &SourceColumnType) -> Result<(IcebergType, ParquetPhysicalType)> {
    use ParquetPhysicalType as P;
    use SourceColumnType as S;

    Ok(match source {
        S::SmallInt | S::Int => (IcebergType::Int, P::Int32),
        S::BigInt => (IcebergType::Long, P::Int64),
        S::Boolean => (IcebergType::Boolean, P::Boolean),
        S::Real => (IcebergType::Float, P::Float),
        S::DoublePrecision => (IcebergType::Double, P::Double),
        S::Decimal { precision, scale } => {
            let byte_len = decimal_byte_length(*precision);
            (
                IcebergType::Decimal {
                    precision: *precision,
                    scale: *scale,
                },
                P::FixedLenByteArray(byte_len),
            )
        }
        S::Date => (IcebergType::Date, P::Int32),
        S::Timestamp => (IcebergType::Timestamp, P::Int64),
        S::TimestampWithTimeZone => (IcebergType::Timestamptz, P::Int64),
        S::Char(_) | S::VarChar(_) | S::Text => (IcebergType::String, P::ByteArray),
        S::Binary | S::VarBinary => (IcebergType::Binary, P::ByteArray),
        S::Uuid => (IcebergType::Uuid, P::FixedLenByteArray(16)),
    })
}

/// Minimum byte width of a `FIXED_LEN_BYTE_ARRAY` that can hold `precision`
/// base-10 digits, per the Parquet decimal encoding spec.
fn decimal_byte_length(precision: u32) -> i32 {
    // ceil(precision * log2(10) / 8), precomputed from the Parquet spec's table.
    let bits_needed = (precision as f64) * std::f64::consts::LOG2_10;
    ((bits_needed / 8.0).ceil() as i32).max(1)
}
