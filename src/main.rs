//! Pricing pipeline
//!
//! Computes daily and monthly prices and SLA metrics for every application
//! group and writes them to the reporting database.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::Parser;
use pricing_pipeline::{
    config::{Environment, Settings},
    db::{ConfigStore, DryRunReportingStore, PgConfigStore, ReportingDb, ReportingRepository, ReportingStore},
    engines::EngineRegistry,
    logging::{RunLogWriter, SizeBasedRollingWriter},
    services::{PipelineController, TargetYear},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

/// Pricing pipeline
///
/// Resolves the pricing model of every application group for YEAR and
/// writes the resulting daily and monthly figures.
#[derive(Parser, Debug)]
#[command(name = "pricing-pipeline")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Target year, matched against the configured matrix years
    year: String,

    /// Log level: trace, debug, info, warn, error (overrides LOG_LEVEL env var)
    #[arg(long)]
    log_level: Option<String>,

    /// Directory for the per-run and shared JSON log files (overrides LOG_DIR env var)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Environment: dev, staging, prod (overrides ENVIRONMENT env var)
    #[arg(short, long)]
    env: Option<Environment>,

    /// Log the records that would be written instead of writing them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (before logging, so we can use log_level)
    let mut settings = Settings::load()?;

    if let Some(log_level) = args.log_level {
        settings.log_level = log_level;
    }
    if let Some(log_dir) = args.log_dir {
        settings.log_dir = Some(log_dir);
    }
    if let Some(env) = args.env {
        settings.environment = env;
    }
    if args.dry_run {
        settings.dry_run = true;
    }

    let started_at = Local::now();
    let run_log = init_tracing(
        &settings.log_level,
        settings.log_dir.as_deref(),
        started_at.naive_local(),
    )?;

    let run_id = Uuid::new_v4();
    let year = TargetYear::parse(&args.year);
    let report_date = started_at.date_naive();

    tracing::info!(
        app_name = %settings.app_name,
        version = %settings.app_version,
        environment = %settings.environment,
        %run_id,
        target_year = %year,
        %report_date,
        monthly_policy = ?settings.monthly_policy,
        write_policy = ?settings.write_policy,
        dry_run = settings.dry_run,
        "Starting pricing run"
    );
    if let Some(path) = &run_log {
        tracing::info!(path = %path.display(), "Writing run log");
    }
    for warning in settings.warnings() {
        tracing::warn!(environment = %settings.environment, "{}", warning);
    }

    let settings = Arc::new(settings);
    let db = Arc::new(
        ReportingDb::connect(settings.clone())
            .await
            .context("Failed to connect to the reporting database")?,
    );

    let config_store: Arc<dyn ConfigStore> = Arc::new(PgConfigStore::new(db.clone()));
    let dry_run_store = settings.dry_run.then(|| Arc::new(DryRunReportingStore::new()));
    let reporting_store: Arc<dyn ReportingStore> = match &dry_run_store {
        Some(store) => store.clone() as Arc<dyn ReportingStore>,
        None => Arc::new(ReportingRepository::new(db.clone(), settings.write_policy)),
    };

    let registry = EngineRegistry::with_defaults();
    tracing::info!(engines = ?registry.kinds(), "Registered query engines");

    let controller = PipelineController::new(
        &settings,
        config_store,
        reporting_store,
        registry,
        report_date,
    );

    let result = controller.run(&year, run_id).await;
    db.close().await;
    let summary = result.context("Pricing run aborted")?;

    if let Some(store) = dry_run_store {
        tracing::info!(records = store.records_seen(), "Dry run complete, nothing written");
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

/// Initialize tracing with a JSON console layer and, when a log directory is
/// set, JSON layers for the per-run file and the shared rotating file.
///
/// Returns the per-run log file path.
fn init_tracing(
    log_level: &str,
    log_dir: Option<&Path>,
    started_at: NaiveDateTime,
) -> Result<Option<PathBuf>> {
    // RUST_LOG wins over the configured level
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let console_layer = fmt::layer().json().with_filter(filter());

    let (run_layer, shared_layer, run_path) = match log_dir {
        Some(dir) => {
            let run_writer = RunLogWriter::create(dir, started_at)
                .with_context(|| format!("Failed to create run log in {}", dir.display()))?;
            let shared_writer = SizeBasedRollingWriter::in_dir(dir)
                .with_context(|| format!("Failed to open shared log in {}", dir.display()))?;
            let run_path = run_writer.path().to_path_buf();

            let run_layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(run_writer)
                .with_filter(filter());
            let shared_layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(shared_writer)
                .with_filter(filter());

            (Some(run_layer), Some(shared_layer), Some(run_path))
        }
        None => (None, None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(run_layer)
        .with(shared_layer)
        .init();

    Ok(run_path)
}
