//! `icelog` command-line entry point.

mod drivers;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use icelog_catalog::FsCatalog;
use icelog_config::{init_tracing, RuntimeConfig, SyncJobConfig};
use icelog_core::driver::SourceDriver;
use icelog_core::types::Schema;
use icelog_sync::coordinator::{CancellationToken, Coordinator, SyncOptions};
use icelog_sync::WatermarkStore;

use drivers::{fixture_path, infer_schema, JsonFileSourceDriver, JsonFileTargetDriver};

/// Bidirectional incremental data synchronization engine built on an
/// Apache Iceberg v2 audit log.
#[derive(Parser)]
#[command(name = "icelog")]
#[command(version)]
#[command(about = "Sync changed rows from a source table to a target table through an Iceberg log", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one cycle per configured job (or a single named job), looping on
    /// an interval unless `--once`.
    Sync {
        /// Path to a TOML configuration file.
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Restrict the run to the job whose `iceberg_table` matches this name.
        #[arg(short, long, value_name = "NAME")]
        table: Option<String>,
        /// Run a single cycle and exit instead of looping.
        #[arg(long)]
        once: bool,
        /// Interval between cycles when looping (seconds).
        #[arg(long, default_value_t = 60)]
        interval_secs: u64,
    },
    /// Create a table's on-disk layout without running a sync cycle.
    InitTable {
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
        #[arg(short, long, value_name = "NAME")]
        table: String,
    },
    /// Print the persisted watermark for a table, or "none" before the
    /// first successful cycle.
    ShowWatermark {
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
        #[arg(short, long, value_name = "NAME")]
        table: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Sync {
            config,
            table,
            once,
            interval_secs,
        } => run_sync(config.as_deref(), table.as_deref(), once, interval_secs).await,
        Commands::InitTable { config, table } => run_init_table(config.as_deref(), &table),
        Commands::ShowWatermark { config, table } => run_show_watermark(config.as_deref(), &table),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<RuntimeConfig> {
    let config = match path {
        Some(p) => RuntimeConfig::load_from(p).with_context(|| format!("failed to load config from {}", p.display()))?,
        None => RuntimeConfig::load().context("failed to load configuration")?,
    };
    init_tracing(&config);
    Ok(config)
}

fn jobs_to_run<'a>(config: &'a RuntimeConfig, table: Option<&str>) -> Result<Vec<&'a SyncJobConfig>> {
    match table {
        Some(name) => {
            let job = config
                .job(name)
                .with_context(|| format!("no configured job for iceberg table '{name}'"))?;
            Ok(vec![job])
        }
        None => Ok(config.jobs.iter().collect()),
    }
}

async fn run_sync(config_path: Option<&std::path::Path>, table: Option<&str>, once: bool, interval_secs: u64) -> Result<()> {
    let config = load_config(config_path)?;
    let cancellation = CancellationToken::new();
    install_signal_handler(cancellation.clone());

    loop {
        let jobs = jobs_to_run(&config, table)?;
        for job in &jobs {
            if cancellation.is_cancelled() {
                warn!(table = %job.iceberg_table, "cancellation received, stopping before next cycle");
                return Ok(());
            }
            run_one_cycle(&config, job, &cancellation).await;
        }

        if once || cancellation.is_cancelled() {
            return Ok(());
        }
        info!(interval_secs, "sync loop sleeping until next cycle");
        tokio::time::sleep(Duration::from_secs(interval_secs)).await;
    }
}

#[tracing::instrument(skip(config, job, cancellation), fields(table = %job.iceberg_table))]
async fn run_one_cycle(config: &RuntimeConfig, job: &SyncJobConfig, cancellation: &CancellationToken) {
    let warehouse = PathBuf::from(&config.warehouse.path);
    let watermark_dir = PathBuf::from(&config.warehouse.watermark_dir);

    let source = JsonFileSourceDriver::new(fixture_path(&warehouse, &job.source_table), job.watermark_column.clone());
    let target_path = warehouse.join(".fixtures").join(format!("{}.target.json", job.target_table));
    let target = JsonFileTargetDriver::new(target_path);

    let options = SyncOptions {
        source_table: job.source_table.clone(),
        iceberg_table: job.iceberg_table.clone(),
        target_table: job.target_table.clone(),
        primary_key: job.primary_key.clone(),
        watermark_column: job.watermark_column.clone(),
        warehouse_path: warehouse.clone(),
        watermark_directory: watermark_dir,
    };

    let schema_hint = schema_for_job(&warehouse, job, &source).await;
    let coordinator = Coordinator::new(&source, &target, options);

    match coordinator.sync(&schema_hint, cancellation).await {
        Ok(result) if result.success => {
            info!(
                extracted = result.extracted,
                imported = result.imported,
                inserted = result.inserted,
                updated = result.updated,
                snapshot_id = ?result.new_snapshot_id,
                duration_ms = result.duration.as_millis() as u64,
                "sync cycle complete"
            );
        }
        Ok(result) => {
            error!(error = result.error_message.as_deref().unwrap_or("unknown"), "sync cycle failed");
        }
        Err(e) => {
            error!(error = %e, "sync cycle errored");
        }
    }
}

/// Uses the current Iceberg schema if the table already exists, otherwise
/// infers one from a representative source row (first-load schema
/// inference).
async fn schema_for_job(warehouse: &std::path::Path, job: &SyncJobConfig, source: &JsonFileSourceDriver) -> Schema {
    let catalog = FsCatalog::new(warehouse);
    if let Ok(Some(metadata)) = catalog.load_table(&job.iceberg_table) {
        if let Some(schema) = metadata.current_schema() {
            return schema.clone();
        }
    }
    match source.query("SELECT * FROM source", &[]).await {
        Ok(rows) if !rows.is_empty() => infer_schema(&rows[0], &job.watermark_column),
        _ => Schema::new(0, Vec::new()),
    }
}

fn run_init_table(config_path: Option<&std::path::Path>, table: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let catalog = FsCatalog::new(PathBuf::from(&config.warehouse.path));
    catalog.initialize_table(table)?;
    println!("initialized table layout for '{table}'");
    Ok(())
}

fn run_show_watermark(config_path: Option<&std::path::Path>, table: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let store = WatermarkStore::new(PathBuf::from(&config.warehouse.watermark_dir));
    match store.get(table)? {
        Some(watermark) => println!(
            "table={} last-sync-timestamp={} last-iceberg-snapshot-id={} row-count={} created-at={}",
            watermark.table_name,
            watermark.last_sync_timestamp,
            watermark.last_iceberg_snapshot_id,
            watermark.row_count,
            watermark.created_at
        ),
        None => println!("none"),
    }
    Ok(())
}

/// Installs a Ctrl-C handler that flips `cancellation`, checked between
/// cycles and at loop boundaries within a cycle — cooperative cancellation
/// rather than a forced interrupt.
fn install_signal_handler(cancellation: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl-C handler");
            return;
        }
        info!("received Ctrl-C, finishing in-flight cycle then stopping");
        cancellation.cancel();
    });
}
