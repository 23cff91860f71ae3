//! Snapshot-aware streaming reader over filesystem Iceberg tables.

mod rows;

pub use rows::TableRowIter;

use std::path::PathBuf;

use tracing::{debug, instrument};

use icelog_catalog::FsCatalog;
use icelog_core::error::SyncError;
use icelog_core::types::{ManifestEntryStatus, ManifestListEntry, TableMetadata};
use icelog_core::Result;

/// Reads Iceberg tables laid out under a single warehouse directory.
pub struct IcebergReader {
    catalog: FsCatalog,
    warehouse: PathBuf,
}

impl IcebergReader {
    pub fn new(warehouse: impl Into<PathBuf>) -> Self {
        let warehouse = warehouse.into();
        Self {
            catalog: FsCatalog::new(warehouse.clone()),
            warehouse,
        }
    }

    /// Loads `table`'s current metadata (or fails with `TableNotFound`).
    pub fn load_metadata(&self, table: &str) -> Result<TableMetadata> {
        self.catalog
            .load_table(table)?
            .ok_or_else(|| SyncError::TableNotFound {
                table: table.to_string(),
            })
    }

    /// Opens a lazy, forward-only row iterator over `table` at `snapshot_id`
    /// (or the current snapshot if `None`).
    ///
    /// This is the reader's key correctness requirement: it reads every
    /// manifest the chosen snapshot's manifest list enumerates — including
    /// manifests carried forward from earlier snapshots — not just the
    /// newest manifest, so a reader of snapshot N sees the whole table as of
    /// N even though only the delta since N-1 was physically written then.
    #[instrument(skip(self), fields(table = %table, snapshot_id = ?snapshot_id))]
    pub fn read_snapshot(&self, table: &str, snapshot_id: Option<i64>) -> Result<TableRowIter> {
        let metadata = self.load_metadata(table)?;
        let schema = metadata
            .current_schema()
            .ok_or_else(|| SyncError::SchemaMismatch {
                table: table.to_string(),
                detail: "table metadata has no current schema".to_string(),
            })?
            .clone();

        let snapshot = match snapshot_id {
            Some(id) => metadata
                .snapshot_by_id(id)
                .ok_or_else(|| SyncError::UnknownSnapshot {
                    table: table.to_string(),
                    snapshot_id: id,
                })?,
            None => metadata
                .current_snapshot()
                .ok_or_else(|| SyncError::UnknownSnapshot {
                    table: table.to_string(),
                    snapshot_id: -1,
                })?,
        };

        let metadata_dir = self.catalog.metadata_dir(table);
        let manifest_list_path = metadata_dir.join(&snapshot.manifest_list);
        let manifest_list: Vec<ManifestListEntry> =
            icelog_avro::read_manifest_list(&manifest_list_path)?;

        let mut data_file_paths = Vec::new();
        for manifest_entry in &manifest_list {
            let manifest_path = metadata_dir.join(&manifest_entry.manifest_path);
            for entry in icelog_avro::read_manifest(&manifest_path)? {
                if matches!(
                    entry.status,
                    ManifestEntryStatus::Added | ManifestEntryStatus::Existing
                ) {
                    data_file_paths.push(self.warehouse.join(&entry.data_file.file_path));
                }
            }
        }

        debug!(
            snapshot_id = snapshot.snapshot_id,
            manifests = manifest_list.len(),
            data_files = data_file_paths.len(),
            "resolved snapshot to data files"
        );
        Ok(TableRowIter::new(schema, data_file_paths))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use icelog_avro::{write_manifest, write_manifest_list};
    use icelog_core::driver::{Row, SqlValue};
    use icelog_core::types::{
        DataFile, Field, IcebergType, ManifestEntry, Schema, Snapshot,
    };
    use icelog_parquet::write_data_file;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn schema() -> Schema {
        Schema::new(
            0,
            vec![
                Field::new(1, "id", true, IcebergType::Int),
                Field::new(2, "name", false, IcebergType::String),
            ],
        )
    }

    fn row(id: i32, name: &str) -> Row {
        let mut r = BTreeMap::new();
        r.insert("id".to_string(), SqlValue::I32(id));
        r.insert("name".to_string(), SqlValue::String(name.to_string()));
        r
    }

    /// Hand-builds a two-snapshot table on disk (mirroring what the append
    /// writer produces) to exercise the carried-forward-manifest reading
    /// path without depending on the coordinator crate.
    #[test]
    fn reads_accumulated_manifests_across_two_snapshots() {
        let dir = tempdir().unwrap();
        let warehouse = dir.path();
        let catalog = FsCatalog::new(warehouse);
        catalog.initialize_table("events").unwrap();

        let data_dir = catalog.data_dir("events");
        let metadata_dir = catalog.metadata_dir("events");

        let file0 = data_dir.join("data-0.parquet");
        let meta0 = write_data_file(&file0, &schema(), &[row(1, "a"), row(2, "b")]).unwrap();
        let manifest0_path = metadata_dir.join("manifest-0.avro");
        write_manifest(
            &manifest0_path,
            &[ManifestEntry {
                status: ManifestEntryStatus::Added,
                snapshot_id: Some(100),
                data_file: DataFile {
                    file_path: "data/data-0.parquet".to_string(),
                    file_format: "PARQUET".to_string(),
                    partition: BTreeMap::new(),
                    record_count: meta0.record_count,
                    file_size_in_bytes: meta0.size_bytes,
                },
            }],
        )
        .unwrap();
        let snap0_path = metadata_dir.join("snap-0.avro");
        let manifest0_len = std::fs::metadata(&manifest0_path).unwrap().len() as i64;
        write_manifest_list(
            &snap0_path,
            &[ManifestListEntry {
                manifest_path: "metadata/manifest-0.avro".to_string(),
                manifest_length: manifest0_len,
                partition_spec_id: 0,
                added_files_count: 1,
                existing_files_count: 0,
                deleted_files_count: 0,
            }],
        )
        .unwrap();

        let mut metadata = TableMetadata::new_table(
            "uuid-1".to_string(),
            warehouse.join("events").to_string_lossy().into_owned(),
            schema(),
            Utc::now().timestamp_millis(),
        );
        metadata.snapshots.push(Snapshot {
            snapshot_id: 100,
            timestamp_ms: Utc::now().timestamp_millis(),
            manifest_list: "metadata/snap-0.avro".to_string(),
        });
        metadata.current_snapshot_id = Some(100);
        catalog.commit("events", &metadata).unwrap();

        let file1 = data_dir.join("data-1.parquet");
        let meta1 = write_data_file(&file1, &schema(), &[row(3, "c")]).unwrap();
        let manifest1_path = metadata_dir.join("manifest-1.avro");
        write_manifest(
            &manifest1_path,
            &[ManifestEntry {
                status: ManifestEntryStatus::Added,
                snapshot_id: Some(200),
                data_file: DataFile {
                    file_path: "data/data-1.parquet".to_string(),
                    file_format: "PARQUET".to_string(),
                    partition: BTreeMap::new(),
                    record_count: meta1.record_count,
                    file_size_in_bytes: meta1.size_bytes,
                },
            }],
        )
        .unwrap();
        let snap1_path = metadata_dir.join("snap-1.avro");
        let manifest1_len = std::fs::metadata(&manifest1_path).unwrap().len() as i64;
        write_manifest_list(
            &snap1_path,
            &[
                ManifestListEntry {
                    manifest_path: "metadata/manifest-0.avro".to_string(),
                    manifest_length: manifest0_len,
                    partition_spec_id: 0,
                    added_files_count: 0,
                    existing_files_count: 1,
                    deleted_files_count: 0,
                },
                ManifestListEntry {
                    manifest_path: "metadata/manifest-1.avro".to_string(),
                    manifest_length: manifest1_len,
                    partition_spec_id: 0,
                    added_files_count: 1,
                    existing_files_count: 0,
                    deleted_files_count: 0,
                },
            ],
        )
        .unwrap();
        metadata.snapshots.push(Snapshot {
            snapshot_id: 200,
            timestamp_ms: Utc::now().timestamp_millis(),
            manifest_list: "metadata/snap-1.avro".to_string(),
        });
        metadata.current_snapshot_id = Some(200);
        catalog.commit("events", &metadata).unwrap();

        let reader = IcebergReader::new(warehouse);
        let rows: Vec<Row> = reader
            .read_snapshot("events", None)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(rows.len(), 3, "snapshot 200 must still see snapshot 100's rows");
    }
}
