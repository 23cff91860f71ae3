//! Filesystem-backed Iceberg catalog: table layout, atomic commits via
//! pointer-swap rename, and metadata load.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use icelog_core::error::SyncError;
use icelog_core::types::TableMetadata;
use icelog_core::Result;

/// One table's on-disk layout, rooted at `<warehouse>/<table>/`.
pub struct FsCatalog {
    warehouse: PathBuf,
}

impl FsCatalog {
    pub fn new(warehouse: impl Into<PathBuf>) -> Self {
        Self {
            warehouse: warehouse.into(),
        }
    }

    fn table_dir(&self, table: &str) -> PathBuf {
        self.warehouse.join(table)
    }

    pub fn data_dir(&self, table: &str) -> PathBuf {
        self.table_dir(table).join("data")
    }

    pub fn metadata_dir(&self, table: &str) -> PathBuf {
        self.table_dir(table).join("metadata")
    }

    fn version_hint_path(&self, table: &str) -> PathBuf {
        self.metadata_dir(table).join("version-hint.txt")
    }

    fn metadata_file_path(&self, table: &str, version: u64) -> PathBuf {
        self.metadata_dir(table).join(format!("v{version}.metadata.json"))
    }

    /// Creates `data/` and `metadata/` for `table`. Idempotent. Fails if the
    /// table path exists and is not a directory.
    pub fn initialize_table(&self, table: &str) -> Result<()> {
        let table_dir = self.table_dir(table);
        if table_dir.exists() && !table_dir.is_dir() {
            return Err(SyncError::TableNotFound {
                table: table.to_string(),
            });
        }
        fs::create_dir_all(self.data_dir(table)).map_err(SyncError::Io)?;
        fs::create_dir_all(self.metadata_dir(table)).map_err(SyncError::Io)?;
        Ok(())
    }

    /// True iff `metadata/version-hint.txt` exists and names a readable
    /// metadata file.
    pub fn table_exists(&self, table: &str) -> bool {
        match self.current_version(table) {
            Some(v) => self.metadata_file_path(table, v).is_file(),
            None => false,
        }
    }

    fn current_version(&self, table: &str) -> Option<u64> {
        let text = fs::read_to_string(self.version_hint_path(table)).ok()?;
        text.trim().parse::<u64>().ok()
    }

    /// Loads the current metadata for `table`, or `None` if the table does
    /// not exist / has no committed version yet.
    #[instrument(skip(self), fields(table = %table))]
    pub fn load_table(&self, table: &str) -> Result<Option<TableMetadata>> {
        let Some(version) = self.current_version(table) else {
            return Ok(None);
        };
        let path = self.metadata_file_path(table, version);
        if !path.is_file() {
            return Ok(None);
        }
        debug!(version, path = %path.display(), "loading table metadata");
        let text = fs::read_to_string(&path).map_err(SyncError::Io)?;
        let metadata: TableMetadata = serde_json::from_str(&text).map_err(|e| {
            SyncError::IcebergCommitFailed {
                table: table.to_string(),
                source: e.into(),
            }
        })?;
        Ok(Some(metadata))
    }

    /// Commits new `metadata` as the next version: writes `v{N}.metadata.json`,
    /// then atomically swaps `version-hint.txt` to point at it via a
    /// same-filesystem rename. Readers observe either the old or the new
    /// hint, never a partial write.
    #[instrument(skip(self, metadata), fields(table = %table))]
    pub fn commit(&self, table: &str, metadata: &TableMetadata) -> Result<u64> {
        self.initialize_table(table)?;
        let next_version = self.current_version(table).unwrap_or(0) + 1;

        debug!(next_version, "committing new metadata version");
        let metadata_path = self.metadata_file_path(table, next_version);
        let text = serde_json::to_string_pretty(metadata).map_err(|e| {
            SyncError::IcebergCommitFailed {
                table: table.to_string(),
                source: e.into(),
            }
        })?;
        fs::write(&metadata_path, text).map_err(SyncError::Io)?;

        let hint_path = self.version_hint_path(table);
        let tmp_path = hint_path.with_extension("txt.tmp");
        fs::write(&tmp_path, next_version.to_string()).map_err(SyncError::Io)?;
        atomic_rename(&tmp_path, &hint_path)?;

        Ok(next_version)
    }
}

/// Same-filesystem atomic rename. On platforms without POSIX rename
/// semantics this fails closed: the caller sees an error rather than a
/// partially written hint.
fn atomic_rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).map_err(|e| {
        SyncError::IcebergCommitFailed {
            table: to.to_string_lossy().into_owned(),
            source: e.into(),
        }
    })
}
