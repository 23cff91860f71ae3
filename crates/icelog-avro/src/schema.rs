//! Literal Avro schema JSON for manifest and manifest-list files, carrying
//! the Iceberg `field-id` / `key-id` / `value-id` annotations verbatim.
//! These strings are exactly what gets embedded in the OCF header via
//! [`crate::ocf::write_container`] — never regenerated.

pub const MANIFEST_ENTRY_SCHEMA_JSON: &str = r#"{
  "type": "record",
  "name": "manifest_entry",
  "fields": [
    {"name": "status", "type": "int", "field-id": 0},
    {"name": "snapshot_id", "type": ["null", "long"], "default": null, "field-id": 1},
    {"name": "data_file", "field-id": 2, "type": {
      "type": "record",
      "name": "r2_data_file",
      "fields": [
        {"name": "file_path", "type": "string", "field-id": 100},
        {"name": "file_format", "type": "string", "field-id": 101},
        {"name": "partition", "type": {"type": "map", "values": "string", "key-id": 102, "value-id": 102}, "field-id": 102},
        {"name": "record_count", "type": "long", "field-id": 103},
        {"name": "file_size_in_bytes", "type": "long", "field-id": 104}
      ]
    }}
  ]
}"#;

pub const MANIFEST_LIST_SCHEMA_JSON: &str = r#"{
  "type": "record",
  "name": "manifest_file",
  "fields": [
    {"name": "manifest_path", "type": "string", "field-id": 500},
    {"name": "manifest_length", "type": "long", "field-id": 501},
    {"name": "partition_spec_id", "type": "int", "field-id": 502},
    {"name": "added_files_count", "type": "int", "field-id": 512},
    {"name": "existing_files_count", "type": "int", "field-id": 513},
    {"name": "deleted_files_count", "type": "int", "field-id": 514}
  ]
}"#;
