//! Layered runtime configuration for the sync engine.
//!
//! Sources are applied lowest to highest precedence: built-in defaults, an
//! optional TOML file, then `ICELOG_*` environment variables.

use anyhow::Result;
use serde::{Deserialize, Serialize};

mod init;
mod sources;
mod validation;

pub use init::init_tracing;

/// Top-level configuration driving one `icelog` process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub warehouse: WarehouseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub jobs: Vec<SyncJobConfig>,
}

/// Where the Iceberg warehouse and watermark store live on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    #[serde(default = "default_warehouse_path")]
    pub path: String,
    #[serde(default = "default_watermark_dir")]
    pub watermark_dir: String,
}

fn default_warehouse_path() -> String {
    "./warehouse".to_string()
}

fn default_watermark_dir() -> String {
    "./warehouse/.watermarks".to_string()
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            path: default_warehouse_path(),
            watermark_dir: default_watermark_dir(),
        }
    }
}

/// One table's worth of source-to-target synchronization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJobConfig {
    pub source_table: String,
    pub iceberg_table: String,
    pub target_table: String,
    pub primary_key: Vec<String>,
    pub watermark_column: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl RuntimeConfig {
    /// Loads configuration from the default locations: `ICELOG_CONFIG` path
    /// if set, otherwise `./icelog.toml` if present, layered under
    /// `ICELOG_*` environment overrides.
    pub fn load() -> Result<Self> {
        sources::load_config(None)
    }

    /// Loads configuration starting from an explicit file path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        sources::load_config(Some(path))
    }

    /// Validates that every job references a usable primary key and
    /// watermark column.
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    pub fn job(&self, iceberg_table: &str) -> Option<&SyncJobConfig> {
        self.jobs.iter().find(|j| j.iceberg_table == iceberg_table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_warehouse_config_is_usable() {
        let config = WarehouseConfig::default();
        assert_eq!(config.path, "./warehouse");
        assert!(config.watermark_dir.contains("watermarks"));
    }

    #[test]
    fn default_log_format_is_text() {
        assert_eq!(LoggingConfig::default().format, LogFormat::Text);
    }

    #[test]
    fn job_lookup_by_iceberg_table_name() {
        let config = RuntimeConfig {
            warehouse: WarehouseConfig::default(),
            logging: LoggingConfig::default(),
            jobs: vec![SyncJobConfig {
                source_table: "orders".to_string(),
                iceberg_table: "orders_log".to_string(),
                target_table: "orders".to_string(),
                primary_key: vec!["id".to_string()],
                watermark_column: "updated_at".to_string(),
            }],
        };
        assert!(config.job("orders_log").is_some());
        assert!(config.job("missing").is_none());
    }
}
