//! recap-pp - Recording Processing Pipeline service
//!
//! Ingests registered recordings and drives them through
//! transcription → analysis until each reaches a terminal state.
//! Runs the recovery sweep and the queue sampler in the background.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use recap_common::events::EventBus;
use recap_pp::config::AppConfig;
use recap_pp::services::{scheduler, HttpAnalysisClient, HttpTranscriptionClient};
use recap_pp::AppState;

#[derive(Parser, Debug)]
#[command(name = "recap-pp", about = "RECAP recording processing pipeline service")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long)]
    config: Option<String>,

    /// Override the HTTP listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Starting recap-pp (Recording Processing Pipeline)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load(args.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    if let Some(port) = args.port {
        config.port = port;
    }

    let db_path = config.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = recap_pp::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    let event_bus = EventBus::new(100);

    let transcriber = Arc::new(HttpTranscriptionClient::new(
        &config.providers,
        &config.pipeline,
    )?);
    let analyzer = Arc::new(HttpAnalysisClient::new(&config.providers, &config.pipeline)?);

    let state = AppState::new(db_pool, event_bus, &config, transcriber, analyzer);

    // Anything left in a working state by a previous run can never make
    // progress on its own; repair or fail it before taking traffic
    match state.recovery.sweep().await {
        Ok(report) => info!(
            scanned = report.scanned,
            repaired = report.repaired(),
            "Startup recovery sweep finished"
        ),
        Err(e) => tracing::error!(error = %e, "Startup recovery sweep failed"),
    }

    // Background tasks: queue sampler and periodic recovery sweep
    let shutdown = CancellationToken::new();

    let monitor = state.queue_monitor.clone();
    scheduler::spawn_periodic(
        "queue_sampler",
        Duration::from_secs(config.pipeline.queue_refresh_secs),
        shutdown.clone(),
        move || {
            let monitor = monitor.clone();
            async move {
                if let Err(e) = monitor.refresh().await {
                    tracing::error!(error = %e, "Queue statistics refresh failed");
                }
            }
        },
    );

    let recovery = state.recovery.clone();
    scheduler::spawn_periodic(
        "recovery_sweep",
        Duration::from_secs(config.pipeline.recovery_sweep_secs),
        shutdown.clone(),
        move || {
            let recovery = recovery.clone();
            async move {
                if let Err(e) = recovery.sweep().await {
                    tracing::error!(error = %e, "Recovery sweep failed");
                }
            }
        },
    );

    let app = recap_pp::build_router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", config.port)).await?;
    info!("Listening on http://127.0.0.1:{}", config.port);
    info!("Health check: http://127.0.0.1:{}/health", config.port);

    axum::serve(listener, app).await?;

    shutdown.cancel();
    Ok(())
}
