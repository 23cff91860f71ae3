//! The Iceberg v2 data model: fields, schemas, snapshots, manifests, table
//! metadata, and the sync engine's own watermark record.

use serde::{Deserialize, Serialize};

/// A stable field type understood by the Iceberg metadata layer.
///
/// Field ids, not names, are the durable identity of a column; `IcebergType`
/// is what a field id resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IcebergType {
    Int,
    Long,
    Boolean,
    Float,
    Double,
    Decimal { precision: u32, scale: u32 },
    Date,
    Timestamp,
    Timestamptz,
    String,
    Binary,
    Uuid,
}

impl IcebergType {
    /// The Iceberg type name as it appears in metadata JSON, e.g. `"decimal(10,2)"`.
    pub fn type_name(&self) -> String {
        match self {
            IcebergType::Int => "int".to_string(),
            IcebergType::Long => "long".to_string(),
            IcebergType::Boolean => "boolean".to_string(),
            IcebergType::Float => "float".to_string(),
            IcebergType::Double => "double".to_string(),
            IcebergType::Decimal { precision, scale } => format!("decimal({precision},{scale})"),
            IcebergType::Date => "date".to_string(),
            IcebergType::Timestamp => "timestamp".to_string(),
            IcebergType::Timestamptz => "timestamptz".to_string(),
            IcebergType::String => "string".to_string(),
            IcebergType::Binary => "binary".to_string(),
            IcebergType::Uuid => "uuid".to_string(),
        }
    }
}

/// One column of a [`Schema`]. The `id` is assigned once at table creation and
/// must survive round-trips through Parquet and Avro schemas unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: i32,
    pub name: String,
    pub required: bool,
    #[serde(rename = "type")]
    pub field_type: IcebergType,
}

impl Field {
    pub fn new(id: i32, name: impl Into<String>, required: bool, field_type: IcebergType) -> Self {
        Self {
            id,
            name: name.into(),
            required,
            field_type,
        }
    }
}

/// An ordered sequence of [`Field`]s. Field ids and names are each unique
/// within a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "schema-id")]
    pub schema_id: i32,
    #[serde(rename = "type")]
    #[serde(default = "default_struct_type")]
    pub schema_type: String,
    pub fields: Vec<Field>,
}

fn default_struct_type() -> String {
    "struct".to_string()
}

impl Schema {
    pub fn new(schema_id: i32, fields: Vec<Field>) -> Self {
        Self {
            schema_id,
            schema_type: default_struct_type(),
            fields,
        }
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn max_field_id(&self) -> i32 {
        self.fields.iter().map(|f| f.id).max().unwrap_or(0)
    }
}

/// An immutable point-in-time view of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "snapshot-id")]
    pub snapshot_id: i64,
    #[serde(rename = "timestamp-ms")]
    pub timestamp_ms: i64,
    #[serde(rename = "manifest-list")]
    pub manifest_list: String,
}

/// The persisted row status carried by a [`ManifestEntry`]. Wire-encoded as
/// the Avro `int` the manifest schema's `status` field declares
/// (`icelog_avro::schema::MANIFEST_ENTRY_SCHEMA_JSON`); `ManifestEntry`
/// itself holds the typed enum, converting to/from the raw int only at the
/// Avro read/write boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum ManifestEntryStatus {
    Existing = 0,
    Added = 1,
    Deleted = 2,
}

impl ManifestEntryStatus {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Existing),
            1 => Some(Self::Added),
            2 => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// One data file recorded by a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFile {
    pub file_path: String,
    pub file_format: String,
    pub partition: std::collections::BTreeMap<String, String>,
    pub record_count: i64,
    pub file_size_in_bytes: i64,
}

/// A manifest record describing one data file's membership in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub status: ManifestEntryStatus,
    pub snapshot_id: Option<i64>,
    pub data_file: DataFile,
}

/// One entry of a manifest-list file, describing one manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestListEntry {
    pub manifest_path: String,
    pub manifest_length: i64,
    pub partition_spec_id: i32,
    pub added_files_count: i32,
    pub existing_files_count: i32,
    pub deleted_files_count: i32,
}

/// The root JSON object persisted at `metadata/v{N}.metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    #[serde(rename = "format-version")]
    pub format_version: i32,
    #[serde(rename = "table-uuid")]
    pub table_uuid: String,
    pub location: String,
    #[serde(rename = "last-updated-ms")]
    pub last_updated_ms: i64,
    #[serde(rename = "last-column-id")]
    pub last_column_id: i32,
    pub schemas: Vec<Schema>,
    #[serde(rename = "current-schema-id")]
    pub current_schema_id: i32,
    #[serde(rename = "partition-specs")]
    pub partition_specs: Vec<serde_json::Value>,
    #[serde(rename = "default-spec-id")]
    pub default_spec_id: i32,
    #[serde(rename = "last-partition-id")]
    pub last_partition_id: i32,
    pub snapshots: Vec<Snapshot>,
    #[serde(rename = "current-snapshot-id")]
    pub current_snapshot_id: Option<i64>,
}

impl TableMetadata {
    /// Creates fresh v2 metadata for a brand-new table: a single schema,
    /// no snapshots yet.
    pub fn new_table(table_uuid: String, location: String, schema: Schema, now_ms: i64) -> Self {
        let last_column_id = schema.max_field_id();
        let schema_id = schema.schema_id;
        Self {
            format_version: 2,
            table_uuid,
            location,
            last_updated_ms: now_ms,
            last_column_id,
            schemas: vec![schema],
            current_schema_id: schema_id,
            partition_specs: vec![],
            default_spec_id: 0,
            last_partition_id: 999,
            snapshots: vec![],
            current_snapshot_id: None,
        }
    }

    pub fn current_schema(&self) -> Option<&Schema> {
        self.schemas
            .iter()
            .find(|s| s.schema_id == self.current_schema_id)
    }

    pub fn current_snapshot(&self) -> Option<&Snapshot> {
        let id = self.current_snapshot_id?;
        self.snapshots.iter().find(|s| s.snapshot_id == id)
    }

    pub fn snapshot_by_id(&self, id: i64) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.snapshot_id == id)
    }
}

/// The persisted high-watermark for one Iceberg table's sync cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    #[serde(rename = "table-name")]
    pub table_name: String,
    #[serde(rename = "last-sync-timestamp")]
    pub last_sync_timestamp: String,
    #[serde(rename = "last-iceberg-snapshot-id")]
    pub last_iceberg_snapshot_id: i64,
    #[serde(rename = "row-count")]
    pub row_count: i64,
    #[serde(rename = "created-at")]
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_round_trips_through_json() {
        let schema = Schema::new(
            0,
            vec![
                Field::new(1, "id", true, IcebergType::Int),
                Field::new(2, "name", false, IcebergType::String),
            ],
        );
        let text = serde_json::to_string(&schema).unwrap();
        let back: Schema = serde_json::from_str(&text).unwrap();
        assert_eq!(schema, back);
        assert_eq!(schema.max_field_id(), 2);
    }

    #[test]
    fn decimal_type_name_includes_precision_and_scale() {
        let ty = IcebergType::Decimal {
            precision: 10,
            scale: 2,
        };
        assert_eq!(ty.type_name(), "decimal(10,2)");
    }
}
