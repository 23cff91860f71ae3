//! Configuration source loading: defaults, an optional TOML file, then
//! `ICELOG_*` environment variable overrides, in that order of precedence.

use crate::*;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;

const ENV_PREFIX: &str = "ICELOG_";

/// Loads configuration. `explicit_path`, when given, is used directly;
/// otherwise `ICELOG_CONFIG` is consulted, falling back to `./icelog.toml`
/// if it exists, and to built-in defaults if neither is present.
pub fn load_config(explicit_path: Option<&Path>) -> Result<RuntimeConfig> {
    let mut config = defaults();

    if let Some(file_config) = load_from_file(explicit_path)? {
        merge_config(&mut config, file_config);
    }

    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

fn defaults() -> RuntimeConfig {
    RuntimeConfig {
        warehouse: WarehouseConfig::default(),
        logging: LoggingConfig::default(),
        jobs: Vec::new(),
    }
}

fn load_from_file(explicit_path: Option<&Path>) -> Result<Option<RuntimeConfig>> {
    if let Some(path) = explicit_path {
        return read_toml(path).map(Some);
    }

    if let Ok(path) = env::var(format!("{ENV_PREFIX}CONFIG")) {
        return read_toml(Path::new(&path)).map(Some);
    }

    let default_path = Path::new("./icelog.toml");
    if default_path.exists() {
        return read_toml(default_path).map(Some);
    }

    Ok(None)
}

fn read_toml(path: &Path) -> Result<RuntimeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("failed to parse config file: {}", path.display()))
}

fn merge_config(base: &mut RuntimeConfig, file: RuntimeConfig) {
    base.warehouse = file.warehouse;
    base.logging = file.logging;
    if !file.jobs.is_empty() {
        base.jobs = file.jobs;
    }
}

fn apply_env_overrides(config: &mut RuntimeConfig) -> Result<()> {
    if let Some(path) = get_env_string("WAREHOUSE_PATH")? {
        config.warehouse.path = path;
    }
    if let Some(dir) = get_env_string("WATERMARK_DIR")? {
        config.warehouse.watermark_dir = dir;
    }
    if let Some(level) = get_env_string("LOG_LEVEL")? {
        config.logging.level = level;
    }
    if let Some(format) = get_env_string("LOG_FORMAT")? {
        config.logging.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }
    Ok(())
}

fn get_env_string(key: &str) -> Result<Option<String>> {
    let full_key = format!("{ENV_PREFIX}{key}");
    match env::var(&full_key) {
        Ok(val) if !val.is_empty() => Ok(Some(val)),
        Ok(_) => Ok(None),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read env var {full_key}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_no_jobs_and_validate() {
        let config = defaults();
        assert!(config.jobs.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn merge_replaces_jobs_only_when_file_supplies_them() {
        let mut base = defaults();
        base.jobs.push(SyncJobConfig {
            source_table: "a".to_string(),
            iceberg_table: "a_log".to_string(),
            target_table: "a".to_string(),
            primary_key: vec!["id".to_string()],
            watermark_column: "updated_at".to_string(),
        });
        let file = defaults();
        merge_config(&mut base, file);
        assert_eq!(base.jobs.len(), 1, "empty file jobs list must not wipe existing jobs");
    }
}
