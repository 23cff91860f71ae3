//! Configuration validation: catches unusable job definitions before a
//! coordinator ever starts a cycle against them.

use crate::*;
use anyhow::{bail, Result};

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    if config.warehouse.path.is_empty() {
        bail!("warehouse.path must not be empty");
    }
    if config.warehouse.watermark_dir.is_empty() {
        bail!("warehouse.watermark_dir must not be empty");
    }

    for job in &config.jobs {
        validate_job(job)?;
    }

    Ok(())
}

fn validate_job(job: &SyncJobConfig) -> Result<()> {
    if job.source_table.is_empty() {
        bail!("job for '{}' has an empty source_table", job.iceberg_table);
    }
    if job.iceberg_table.is_empty() {
        bail!("a job has an empty iceberg_table name");
    }
    if job.target_table.is_empty() {
        bail!("job '{}' has an empty target_table", job.iceberg_table);
    }
    if job.primary_key.is_empty() {
        bail!(
            "job '{}' has an empty primary_key; merges require at least one key column",
            job.iceberg_table
        );
    }
    if job.watermark_column.is_empty() {
        bail!("job '{}' has an empty watermark_column", job.iceberg_table);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> SyncJobConfig {
        SyncJobConfig {
            source_table: "orders".to_string(),
            iceberg_table: "orders_log".to_string(),
            target_table: "orders".to_string(),
            primary_key: vec!["id".to_string()],
            watermark_column: "updated_at".to_string(),
        }
    }

    #[test]
    fn valid_job_passes() {
        assert!(validate_job(&job()).is_ok());
    }

    #[test]
    fn empty_primary_key_is_rejected() {
        let mut j = job();
        j.primary_key.clear();
        assert!(validate_job(&j).is_err());
    }

    #[test]
    fn empty_watermark_column_is_rejected() {
        let mut j = job();
        j.watermark_column.clear();
        assert!(validate_job(&j).is_err());
    }

    #[test]
    fn watermark_column_may_double_as_primary_key_for_id_based_strategies() {
        let mut j = job();
        j.primary_key = vec!["updated_at".to_string()];
        assert!(validate_job(&j).is_ok());
    }
}
