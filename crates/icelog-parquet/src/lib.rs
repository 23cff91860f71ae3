//! Parquet data file writer with embedded Iceberg field-ids.

mod schema;
mod writer;

pub use schema::{arrow_schema_with_field_ids, field_id_of};
pub use writer::{write_data_file, ColumnStats, DataFileMetadata};
