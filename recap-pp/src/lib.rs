//! recap-pp library interface
//!
//! Exposes public APIs for integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult, PipelineError};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::AppConfig;
use crate::services::{
    Analyzer, ProcessingClient, QueueMonitor, RecoveryScanner, Transcriber,
};
use recap_common::events::EventBus;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Drives recordings through the pipeline
    pub processing: Arc<ProcessingClient>,
    /// Repairs and retries stuck recordings
    pub recovery: Arc<RecoveryScanner>,
    /// Samples job statistics
    pub queue_monitor: Arc<QueueMonitor>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        config: &AppConfig,
        transcriber: Arc<dyn Transcriber>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Self {
        let processing = Arc::new(ProcessingClient::new(
            db.clone(),
            event_bus.clone(),
            &config.pipeline,
            transcriber,
            analyzer,
        ));
        let recovery = Arc::new(RecoveryScanner::new(
            db.clone(),
            event_bus.clone(),
            config.pipeline.stale_after_minutes,
        ));
        let queue_monitor = Arc::new(QueueMonitor::new(
            db.clone(),
            event_bus.clone(),
            config.pipeline.queue_sample_size,
        ));

        Self {
            db,
            event_bus,
            processing,
            recovery,
            queue_monitor,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::recording_routes())
        .merge(api::process_routes())
        .merge(api::recover_routes())
        .merge(api::queue_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
