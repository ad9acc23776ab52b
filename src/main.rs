//! Stale-user archival job
//!
//! Moves users that registered long ago and have been inactive since out of
//! the live ClickHouse event table into the archive:
//! - run-once: one select → fetch → archive → evict → report pass (default)
//! - schedule: the same pass on a fixed interval
//! - relay: drains the login outbox into Redpanda
//! - init-schema: creates the ClickHouse tables

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

use archive_core::{ArchivalConfig, RelayConfig, RunStatus};
use clickhouse_client::{
    ClickHouseActiveStore, ClickHouseArchiveStore, ClickHouseClient, ClickHouseConfig,
    ClickHouseOutbox, ClickHouseReportSink,
};
use redpanda::{Producer, RedpandaConfig};
use telemetry::init_tracing_from_env;
use worker::{ArchivalJob, FileReportSink, JobScheduler, RelayWorker, Reporter};

/// CLI arguments for the archival job
#[derive(Parser, Debug)]
#[command(version, about = "Stale-user archival job", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Config file, without extension (TOML)
    #[arg(short, long, global = true, default_value = "config/default")]
    config: String,

    /// Select and fetch only, move nothing
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(clap::Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Run one archival pass and exit (default)
    RunOnce,
    /// Run archival passes on the configured interval
    Schedule,
    /// Relay pending login rows to Redpanda
    Relay,
    /// Create the ClickHouse database and tables
    InitSchema,
}

/// Application configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default)]
    archival: ArchivalConfig,

    #[serde(default)]
    relay: RelayConfig,

    #[serde(default)]
    clickhouse: ClickHouseConfig,

    #[serde(default)]
    redpanda: RedpandaConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    let args = Args::parse();
    info!("Starting archival job v{}", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(&args.config)?;
    if args.dry_run {
        config.archival.dry_run = true;
    }

    // Refuse to start on invalid config, before touching any store
    config.archival = config.archival.validated()?;
    config.relay = config.relay.validated()?;

    let clickhouse = ClickHouseClient::new(config.clickhouse.clone());

    let code = match args.command.unwrap_or(Command::RunOnce) {
        Command::RunOnce => run_once(&config, &clickhouse).await?,
        Command::Schedule => {
            schedule(&config, &clickhouse).await;
            0
        }
        Command::Relay => {
            relay(&config, &clickhouse).await;
            0
        }
        Command::InitSchema => {
            clickhouse_client::health::init_schema(&clickhouse)
                .await
                .context("Failed to initialize ClickHouse schema")?;
            info!("ClickHouse schema initialized");
            0
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Wires the ClickHouse stores and report sinks into a job.
fn build_job(config: &Config, clickhouse: &ClickHouseClient) -> ArchivalJob {
    let active = Arc::new(ClickHouseActiveStore::new(clickhouse.clone()));
    let archive = Arc::new(ClickHouseArchiveStore::new(clickhouse.clone()));

    let mut reporter = Reporter::default().with_sink(Arc::new(FileReportSink::new(
        config.archival.report_sink_path_template.clone(),
    )));
    if config.archival.report_to_clickhouse {
        reporter = reporter.with_sink(Arc::new(ClickHouseReportSink::new(clickhouse.clone())));
    }

    ArchivalJob::new(config.archival.clone(), active, archive, reporter)
}

/// One pass. Returns the exit code: 0 on success, 2 when eviction was
/// incomplete. Aborted runs surface as errors (exit 1).
async fn run_once(config: &Config, clickhouse: &ClickHouseClient) -> Result<i32> {
    if !clickhouse_client::health::check_connection(clickhouse).await {
        warn!("ClickHouse connection: unhealthy");
    }

    let job = build_job(config, clickhouse);
    let summary = job.run().await.context("Archival run failed")?;

    if summary.status() == RunStatus::EvictionIncomplete {
        error!("{}", summary);
    } else {
        info!("{}", summary);
    }

    Ok(summary.exit_code())
}

async fn schedule(config: &Config, clickhouse: &ClickHouseClient) {
    let job = Arc::new(build_job(config, clickhouse));
    let scheduler = Arc::new(JobScheduler::from_config(job));
    let handle = scheduler.start();

    shutdown_signal().await;
    handle.abort();
    info!("Scheduler stopped");
}

async fn relay(config: &Config, clickhouse: &ClickHouseClient) {
    if !redpanda::health::check_connection(&config.redpanda).await {
        warn!("Redpanda connection: unhealthy");
    }

    let worker = RelayWorker::new(
        Arc::new(ClickHouseOutbox::new(clickhouse.clone())),
        Arc::new(Producer::new(config.redpanda.clone())),
        config.relay.clone(),
    );

    tokio::select! {
        _ = worker.run() => {}
        _ = shutdown_signal() => {
            info!("Relay stopped");
        }
    }
}

/// Load configuration from files and environment.
fn load_config(path: &str) -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name(path)
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables, e.g. ARCHIVAL__ARCHIVAL__DRY_RUN
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("ARCHIVAL")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // The config crate's nested parsing doesn't work reliably with underscored field names
    if let Ok(url) = std::env::var("ARCHIVAL_CLICKHOUSE_URL") {
        config.clickhouse.url = url;
    }
    if let Ok(database) = std::env::var("ARCHIVAL_CLICKHOUSE_DATABASE") {
        config.clickhouse.database = database;
    }
    if let Ok(username) = std::env::var("ARCHIVAL_CLICKHOUSE_USERNAME") {
        config.clickhouse.username = Some(username);
    }
    if let Ok(password) = std::env::var("ARCHIVAL_CLICKHOUSE_PASSWORD") {
        config.clickhouse.password = Some(password);
    }

    if let Ok(brokers) = std::env::var("ARCHIVAL_REDPANDA_BROKERS") {
        config.redpanda.brokers = brokers.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Ok(topic) = std::env::var("ARCHIVAL_REDPANDA_TOPIC") {
        config.redpanda.topic = topic;
    }

    if let Ok(template) = std::env::var("ARCHIVAL_REPORT_PATH_TEMPLATE") {
        config.archival.report_sink_path_template = template;
    }

    Ok(config)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
