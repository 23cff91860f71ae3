//! Builds an Arrow schema whose field metadata carries the Iceberg field-id
//! (`PARQUET:field_id`), the metadata key the Arrow writer recognizes
//! natively and a reader can use to reconstruct Iceberg column identity
//! from a Parquet file alone.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema, TimeUnit};

use icelog_core::{IcebergType, Schema as IcebergSchema};

pub const FIELD_ID_META_KEY: &str = "PARQUET:field_id";

fn arrow_type_for(field_type: &IcebergType) -> DataType {
    match field_type {
        IcebergType::Int => DataType::Int32,
        IcebergType::Long => DataType::Int64,
        IcebergType::Boolean => DataType::Boolean,
        IcebergType::Float => DataType::Float32,
        IcebergType::Double => DataType::Float64,
        IcebergType::Decimal { precision, scale } => {
            DataType::Decimal128(*precision as u8, *scale as i8)
        }
        IcebergType::Date => DataType::Date32,
        IcebergType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
        IcebergType::Timestamptz => {
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
        }
        IcebergType::String => DataType::Utf8,
        IcebergType::Binary => DataType::Binary,
        IcebergType::Uuid => DataType::FixedSizeBinary(16),
    }
}

/// Converts an Iceberg [`Schema`](IcebergSchema) into an Arrow schema where
/// every leaf field carries its Iceberg field-id as metadata, so the Parquet
/// writer (and any field-id-aware reader) can recover stable column identity.
pub fn arrow_schema_with_field_ids(schema: &IcebergSchema) -> ArrowSchema {
    let fields: Vec<ArrowField> = schema
        .fields
        .iter()
        .map(|f| {
            let mut metadata = HashMap::new();
            metadata.insert(FIELD_ID_META_KEY.to_string(), f.id.to_string());
            ArrowField::new(&f.name, arrow_type_for(&f.field_type), !f.required)
                .with_metadata(metadata)
        })
        .collect();
    ArrowSchema::new(fields)
}

/// Looks up the Iceberg field-id a Parquet/Arrow field was written with.
pub fn field_id_of(field: &Arc<ArrowField>) -> Option<i32> {
    field
        .metadata()
        .get(FIELD_ID_META_KEY)
        .and_then(|v| v.parse::<i32>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use icelog_core::Field as IField;

    #[test]
    fn field_ids_survive_conversion() {
        let schema = IcebergSchema::new(
            0,
            vec![
                IField::new(1, "id", true, IcebergType::Int),
                IField::new(2, "name", false, IcebergType::String),
            ],
        );
        let arrow_schema = arrow_schema_with_field_ids(&schema);
        assert_eq!(
            arrow_schema.field(0).metadata().get(FIELD_ID_META_KEY),
            Some(&"1".to_string())
        );
        assert_eq!(arrow_schema.field(1).is_nullable(), true);
    }
}
