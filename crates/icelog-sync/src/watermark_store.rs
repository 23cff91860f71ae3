//! Per-table watermark persistence: one JSON file per Iceberg table,
//! written via temp-file + rename.

use std::fs;
use std::path::PathBuf;

use icelog_core::error::SyncError;
use icelog_core::types::Watermark;
use icelog_core::Result;

pub struct WatermarkStore {
    directory: PathBuf,
}

impl WatermarkStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn path_for(&self, table: &str) -> PathBuf {
        self.directory.join(format!("{table}.json"))
    }

    /// Returns `None` for a missing file (first cycle for this table).
    pub fn get(&self, table: &str) -> Result<Option<Watermark>> {
        let path = self.path_for(table);
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path).map_err(|e| SyncError::WatermarkIoFailure {
            table: table.to_string(),
            source: e,
        })?;
        let watermark: Watermark = serde_json::from_str(&text).map_err(|e| {
            SyncError::WatermarkIoFailure {
                table: table.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            }
        })?;
        Ok(Some(watermark))
    }

    /// Overwrites the watermark for `table` atomically.
    pub fn put(&self, watermark: &Watermark) -> Result<()> {
        fs::create_dir_all(&self.directory).map_err(|e| SyncError::WatermarkIoFailure {
            table: watermark.table_name.clone(),
            source: e,
        })?;
        let path = self.path_for(&watermark.table_name);
        let tmp_path = path.with_extension("json.tmp");
        let text = serde_json::to_string_pretty(watermark).map_err(|e| {
            SyncError::WatermarkIoFailure {
                table: watermark.table_name.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            }
        })?;
        fs::write(&tmp_path, text).map_err(|e| SyncError::WatermarkIoFailure {
            table: watermark.table_name.clone(),
            source: e,
        })?;
        fs::rename(&tmp_path, &path).map_err(|e| SyncError::WatermarkIoFailure {
            table: watermark.table_name.clone(),
            source: e,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample(table: &str) -> Watermark {
        Watermark {
            table_name: table.to_string(),
            last_sync_timestamp: "2026-01-01T00:00:00Z".to_string(),
            last_iceberg_snapshot_id: 1,
            row_count: 10,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn get_is_none_before_first_put() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path());
        assert!(store.get("events").unwrap().is_none());
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path());
        store.put(&sample("events")).unwrap();
        let loaded = store.get("events").unwrap().unwrap();
        assert_eq!(loaded.row_count, 10);
    }

    #[test]
    fn put_overwrites_atomically() {
        let dir = tempdir().unwrap();
        let store = WatermarkStore::new(dir.path());
        store.put(&sample("events")).unwrap();
        let mut second = sample("events");
        second.row_count = 20;
        store.put(&second).unwrap();
        assert_eq!(store.get("events").unwrap().unwrap().row_count, 20);
    }
}
