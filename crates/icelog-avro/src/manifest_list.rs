//! Manifest-list file read/write: one Avro file enumerating every manifest
//! belonging to a snapshot, including carried-forward manifests from prior
//! snapshots.

use std::path::Path;

use apache_avro::types::Value;
use apache_avro::Schema;

use icelog_core::error::SyncError;
use icelog_core::types::ManifestListEntry;
use icelog_core::Result;

use crate::ocf;
use crate::schema::MANIFEST_LIST_SCHEMA_JSON;

fn entry_to_avro(entry: &ManifestListEntry) -> Value {
    Value::Record(vec![
        ("manifest_path".to_string(), Value::String(entry.manifest_path.clone())),
        ("manifest_length".to_string(), Value::Long(entry.manifest_length)),
        ("partition_spec_id".to_string(), Value::Int(entry.partition_spec_id)),
        ("added_files_count".to_string(), Value::Int(entry.added_files_count)),
        (
            "existing_files_count".to_string(),
            Value::Int(entry.existing_files_count),
        ),
        ("deleted_files_count".to_string(), Value::Int(entry.deleted_files_count)),
    ])
}

fn avro_to_entry(value: &Value) -> Result<ManifestListEntry> {
    let fields = match value {
        Value::Record(fields) => fields,
        other => {
            return Err(SyncError::AvroWriteFailed {
                source: anyhow::anyhow!("expected manifest-list entry record, got {other:?}"),
            })
        }
    };
    let get = |name: &str| {
        fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    };
    let manifest_path = match get("manifest_path") {
        Some(Value::String(s)) => s,
        _ => return Err(malformed("manifest_path")),
    };
    let manifest_length = match get("manifest_length") {
        Some(Value::Long(v)) => v,
        _ => return Err(malformed("manifest_length")),
    };
    let partition_spec_id = match get("partition_spec_id") {
        Some(Value::Int(v)) => v,
        _ => return Err(malformed("partition_spec_id")),
    };
    let added_files_count = match get("added_files_count") {
        Some(Value::Int(v)) => v,
        _ => return Err(malformed("added_files_count")),
    };
    let existing_files_count = match get("existing_files_count") {
        Some(Value::Int(v)) => v,
        _ => return Err(malformed("existing_files_count")),
    };
    let deleted_files_count = match get("deleted_files_count") {
        Some(Value::Int(v)) => v,
        _ => return Err(malformed("deleted_files_count")),
    };

    Ok(ManifestListEntry {
        manifest_path,
        manifest_length,
        partition_spec_id,
        added_files_count,
        existing_files_count,
        deleted_files_count,
    })
}

fn malformed(field: &str) -> SyncError {
    SyncError::AvroWriteFailed {
        source: anyhow::anyhow!("malformed manifest-list entry: missing or mistyped {field}"),
    }
}

/// Writes a manifest-list file. `entries` MUST already include carried-forward
/// manifests from the prior snapshot; this function performs no accumulation
/// of its own (that is the append writer's responsibility).
pub fn write_manifest_list(path: &Path, entries: &[ManifestListEntry]) -> Result<i64> {
    let schema = Schema::parse_str(MANIFEST_LIST_SCHEMA_JSON)
        .map_err(|e| SyncError::AvroWriteFailed { source: e.into() })?;
    let records: Vec<Value> = entries.iter().map(entry_to_avro).collect();
    ocf::write_container(path, MANIFEST_LIST_SCHEMA_JSON, &schema, &records)
}

/// Reads every manifest-list entry back, in file order.
pub fn read_manifest_list(path: &Path) -> Result<Vec<ManifestListEntry>> {
    ocf::read_records(path)?
        .iter()
        .map(avro_to_entry)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample(path: &str, added: i32, existing: i32) -> ManifestListEntry {
        ManifestListEntry {
            manifest_path: path.to_string(),
            manifest_length: 100,
            partition_spec_id: 0,
            added_files_count: added,
            existing_files_count: existing,
            deleted_files_count: 0,
        }
    }

    #[test]
    fn accumulated_entries_round_trip_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snap-0.avro");
        let entries = vec![
            sample("metadata/manifest-0.avro", 0, 5),
            sample("metadata/manifest-1.avro", 3, 0),
        ];
        write_manifest_list(&path, &entries).unwrap();
        let back = read_manifest_list(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].existing_files_count, 5);
        assert_eq!(back[1].added_files_count, 3);
    }
}
