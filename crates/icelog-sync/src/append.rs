//! Append (snapshot writer): produces a new snapshot whose manifest list
//! carries forward every prior manifest plus the newly written one.
//! Handles both `CreateInitial` (no prior table) and
//! `Append` (table exists) — the two differ only in whether a prior
//! snapshot exists to carry forward from, which this function already
//! branches on internally.

use std::collections::BTreeMap;
use std::path::Path;

use uuid::Uuid;

use icelog_catalog::FsCatalog;
use icelog_core::driver::Row;
use icelog_core::types::{
    DataFile, ManifestEntry, ManifestEntryStatus, ManifestListEntry, Schema, Snapshot,
    TableMetadata,
};
use icelog_core::Result;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Compares two schemas by field id/name/type, ignoring `schema-id` and
/// field order — a batch re-inferred each cycle need not reproduce the
/// table's original `schema-id` to be considered compatible.
fn fields_match(existing: &Schema, candidate: &Schema) -> bool {
    if existing.fields.len() != candidate.fields.len() {
        return false;
    }
    existing.fields.iter().all(|field| {
        candidate
            .fields
            .iter()
            .any(|other| other.id == field.id && other.name == field.name && other.field_type == field.field_type)
    })
}

/// Generates a fresh snapshot id. Wall-clock-derived with a random
/// low-order component; uniqueness within the table is the only hard
/// requirement, not strict monotonicity across process restarts.
fn new_snapshot_id() -> i64 {
    let millis = now_ms();
    let entropy = (Uuid::new_v4().as_u128() & 0xffff) as i64;
    millis.wrapping_mul(1_000_000).wrapping_add(entropy)
}

/// Appends `rows` to `table`, creating the table first if it does not yet
/// exist. Returns `Ok(None)` without writing anything if `rows` is empty
/// (the reference skip-on-empty-batch policy).
pub fn append(warehouse: &Path, table: &str, schema: &Schema, rows: &[Row]) -> Result<Option<i64>> {
    if rows.is_empty() {
        return Ok(None);
    }

    let catalog = FsCatalog::new(warehouse);
    catalog.initialize_table(table)?;
    let existing_metadata = catalog.load_table(table)?;

    if let Some(existing) = existing_metadata.as_ref().and_then(|m| m.current_schema()) {
        if !fields_match(existing, schema) {
            return Err(icelog_core::error::SyncError::SchemaMismatch {
                table: table.to_string(),
                detail: "batch schema disagrees with the table's current schema".to_string(),
            });
        }
    }

    let mut metadata = existing_metadata.unwrap_or_else(|| {
        TableMetadata::new_table(
            Uuid::new_v4().to_string(),
            warehouse.join(table).to_string_lossy().into_owned(),
            schema.clone(),
            now_ms(),
        )
    });

    let file_id = Uuid::new_v4();
    let data_rel_path = format!("data/data-{file_id}.parquet");
    let data_path = warehouse.join(table).join(&data_rel_path);
    let file_meta = icelog_parquet::write_data_file(&data_path, schema, rows)?;

    let snapshot_id = new_snapshot_id();

    let manifest_entry = ManifestEntry {
        status: ManifestEntryStatus::Added,
        snapshot_id: Some(snapshot_id),
        data_file: DataFile {
            file_path: data_rel_path,
            file_format: "PARQUET".to_string(),
            partition: BTreeMap::new(),
            record_count: file_meta.record_count,
            file_size_in_bytes: file_meta.size_bytes,
        },
    };

    let manifest_rel_path = format!("metadata/manifest-{file_id}.avro");
    let manifest_path = warehouse.join(table).join(&manifest_rel_path);
    icelog_avro::write_manifest(&manifest_path, &[manifest_entry])?;
    let manifest_length = std::fs::metadata(&manifest_path)
        .map_err(icelog_core::error::SyncError::Io)?
        .len() as i64;

    let mut manifest_list_entries = carry_forward_manifests(&catalog, table, &metadata)?;
    manifest_list_entries.push(ManifestListEntry {
        manifest_path: manifest_rel_path,
        manifest_length,
        partition_spec_id: 0,
        added_files_count: 1,
        existing_files_count: 0,
        deleted_files_count: 0,
    });

    let manifest_list_rel_path = format!("metadata/snap-{file_id}.avro");
    let manifest_list_path = warehouse.join(table).join(&manifest_list_rel_path);
    icelog_avro::write_manifest_list(&manifest_list_path, &manifest_list_entries)?;

    metadata.snapshots.push(Snapshot {
        snapshot_id,
        timestamp_ms: now_ms(),
        manifest_list: manifest_list_rel_path,
    });
    metadata.current_snapshot_id = Some(snapshot_id);
    metadata.last_updated_ms = now_ms();

    catalog.commit(table, &metadata)?;
    Ok(Some(snapshot_id))
}

/// Reads the prior snapshot's manifest list (if any) and rolls each entry's
/// `added_files_count` into `existing_files_count`, since those files are no
/// longer new as of this append.
fn carry_forward_manifests(
    catalog: &FsCatalog,
    table: &str,
    metadata: &TableMetadata,
) -> Result<Vec<ManifestListEntry>> {
    let Some(prior_snapshot) = metadata.current_snapshot() else {
        return Ok(Vec::new());
    };
    let prior_list_path = catalog.metadata_dir(table).join(&prior_snapshot.manifest_list);
    let prior_entries = icelog_avro::read_manifest_list(&prior_list_path)?;
    Ok(prior_entries
        .into_iter()
        .map(|mut entry| {
            entry.existing_files_count += entry.added_files_count;
            entry.added_files_count = 0;
            entry
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use icelog_core::driver::SqlValue;
    use icelog_core::types::{Field, IcebergType};
    use icelog_reader::IcebergReader;
    use tempfile::tempdir;

    fn schema() -> Schema {
        Schema::new(0, vec![Field::new(1, "id", true, IcebergType::Int)])
    }

    fn row(id: i32) -> Row {
        let mut r = BTreeMap::new();
        r.insert("id".to_string(), SqlValue::I32(id));
        r
    }

    #[test]
    fn empty_batch_skips_commit() {
        let dir = tempdir().unwrap();
        let result = append(dir.path(), "events", &schema(), &[]).unwrap();
        assert!(result.is_none());
        let catalog = FsCatalog::new(dir.path());
        assert!(!catalog.table_exists("events"));
    }

    #[test]
    fn second_append_accumulates_on_top_of_first() {
        let dir = tempdir().unwrap();
        let first = append(dir.path(), "events", &schema(), &[row(1), row(2)])
            .unwrap()
            .unwrap();
        let second = append(dir.path(), "events", &schema(), &[row(3)])
            .unwrap()
            .unwrap();
        assert_ne!(first, second);

        let reader = IcebergReader::new(dir.path());
        let rows: Vec<_> = reader
            .read_snapshot("events", None)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(rows.len(), 3, "second snapshot must include the first append's rows too");
    }

    #[test]
    fn append_rejects_a_batch_whose_schema_disagrees_with_the_table() {
        let dir = tempdir().unwrap();
        append(dir.path(), "events", &schema(), &[row(1)]).unwrap();

        let incompatible = Schema::new(0, vec![Field::new(1, "id", true, IcebergType::String)]);
        let err = append(dir.path(), "events", &incompatible, &[row(2)]).unwrap_err();
        assert!(matches!(err, icelog_core::error::SyncError::SchemaMismatch { .. }));
    }
}
