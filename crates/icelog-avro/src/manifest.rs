//! Manifest file read/write: one Avro file enumerating the data files
//! belonging to a single append.

use std::path::Path;

use apache_avro::types::Value;
use apache_avro::Schema;

use icelog_core::error::SyncError;
use icelog_core::types::{DataFile, ManifestEntry, ManifestEntryStatus};
use icelog_core::Result;

use crate::ocf;
use crate::schema::MANIFEST_ENTRY_SCHEMA_JSON;

fn data_file_to_avro(data_file: &DataFile) -> Value {
    Value::Record(vec![
        ("file_path".to_string(), Value::String(data_file.file_path.clone())),
        ("file_format".to_string(), Value::String(data_file.file_format.clone())),
        (
            "partition".to_string(),
            Value::Map(
                data_file
                    .partition
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
        ),
        ("record_count".to_string(), Value::Long(data_file.record_count)),
        (
            "file_size_in_bytes".to_string(),
            Value::Long(data_file.file_size_in_bytes),
        ),
    ])
}

fn entry_to_avro(entry: &ManifestEntry) -> Value {
    Value::Record(vec![
        ("status".to_string(), Value::Int(entry.status.as_i32())),
        (
            "snapshot_id".to_string(),
            match entry.snapshot_id {
                Some(id) => Value::Union(1, Box::new(Value::Long(id))),
                None => Value::Union(0, Box::new(Value::Null)),
            },
        ),
        ("data_file".to_string(), data_file_to_avro(&entry.data_file)),
    ])
}

fn avro_to_entry(value: &Value) -> Result<ManifestEntry> {
    let fields = match value {
        Value::Record(fields) => fields,
        other => {
            return Err(SyncError::AvroWriteFailed {
                source: anyhow::anyhow!("expected manifest entry record, got {other:?}"),
            })
        }
    };
    let get = |name: &str| {
        fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    };

    let status = match get("status") {
        Some(Value::Int(i)) => {
            ManifestEntryStatus::from_i32(i).ok_or_else(|| malformed("status"))?
        }
        _ => return Err(malformed("status")),
    };
    let snapshot_id = match get("snapshot_id") {
        Some(Value::Union(_, boxed)) => match *boxed {
            Value::Long(v) => Some(v),
            Value::Null => None,
            _ => return Err(malformed("snapshot_id")),
        },
        _ => None,
    };
    let data_file_value = get("data_file").ok_or_else(|| malformed("data_file"))?;
    let data_file_fields = match data_file_value {
        Value::Record(f) => f,
        _ => return Err(malformed("data_file")),
    };
    let dget = |name: &str| {
        data_file_fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    };
    let file_path = match dget("file_path") {
        Some(Value::String(s)) => s,
        _ => return Err(malformed("file_path")),
    };
    let file_format = match dget("file_format") {
        Some(Value::String(s)) => s,
        _ => return Err(malformed("file_format")),
    };
    let partition = match dget("partition") {
        Some(Value::Map(m)) => m
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k, s)),
                _ => None,
            })
            .collect(),
        _ => Default::default(),
    };
    let record_count = match dget("record_count") {
        Some(Value::Long(v)) => v,
        _ => return Err(malformed("record_count")),
    };
    let file_size_in_bytes = match dget("file_size_in_bytes") {
        Some(Value::Long(v)) => v,
        _ => return Err(malformed("file_size_in_bytes")),
    };

    Ok(ManifestEntry {
        status,
        snapshot_id,
        data_file: DataFile {
            file_path,
            file_format,
            partition,
            record_count,
            file_size_in_bytes,
        },
    })
}

fn malformed(field: &str) -> SyncError {
    SyncError::AvroWriteFailed {
        source: anyhow::anyhow!("malformed manifest entry: missing or mistyped {field}"),
    }
}

/// Writes a manifest file listing `entries`. Returns the file's length in
/// bytes, needed for the manifest-list entry this manifest will be
/// referenced by.
pub fn write_manifest(path: &Path, entries: &[ManifestEntry]) -> Result<i64> {
    let schema = Schema::parse_str(MANIFEST_ENTRY_SCHEMA_JSON)
        .map_err(|e| SyncError::AvroWriteFailed { source: e.into() })?;
    let records: Vec<Value> = entries.iter().map(entry_to_avro).collect();
    ocf::write_container(path, MANIFEST_ENTRY_SCHEMA_JSON, &schema, &records)
}

/// Reads every entry back out of a manifest file, in file order.
pub fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    ocf::read_records(path)?
        .iter()
        .map(avro_to_entry)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn sample_entry(path: &str) -> ManifestEntry {
        ManifestEntry {
            status: ManifestEntryStatus::Added,
            snapshot_id: Some(42),
            data_file: DataFile {
                file_path: path.to_string(),
                file_format: "PARQUET".to_string(),
                partition: BTreeMap::new(),
                record_count: 10,
                file_size_in_bytes: 1234,
            },
        }
    }

    #[test]
    fn round_trips_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest-0.avro");
        let entries = vec![sample_entry("data/a.parquet"), sample_entry("data/b.parquet")];
        write_manifest(&path, &entries).unwrap();
        let back = read_manifest(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].data_file.file_path, "data/a.parquet");
        assert_eq!(back[1].data_file.record_count, 10);
    }

    #[test]
    fn header_preserves_field_id_annotations() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest-1.avro");
        write_manifest(&path, &[sample_entry("data/a.parquet")]).unwrap();
        let schema_text = ocf::read_schema_json(&path).unwrap();
        assert!(schema_text.contains("\"field-id\": 100"));
        assert!(schema_text.contains("\"key-id\""));
    }
}
