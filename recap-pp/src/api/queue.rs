//! Queue health endpoints
//!
//! GET returns the last sampled statistics; POST refresh runs the same
//! query/aggregation synchronously. Both go through QueueMonitor::refresh,
//! so the two paths cannot drift.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use crate::error::ApiResult;
use crate::services::QueueStats;
use crate::AppState;

/// GET /queue/stats
///
/// Returns the cached sample, computing one if the sampler has not run
/// yet (e.g. immediately after startup).
pub async fn queue_stats(State(state): State<AppState>) -> ApiResult<Json<QueueStats>> {
    let stats = match state.queue_monitor.latest().await {
        Some(stats) => stats,
        None => state.queue_monitor.refresh().await?,
    };
    Ok(Json(stats))
}

/// POST /queue/stats/refresh
///
/// Manual refresh: identical fetch and aggregation as the periodic
/// sampler, run synchronously.
pub async fn refresh_queue_stats(State(state): State<AppState>) -> ApiResult<Json<QueueStats>> {
    let stats = state.queue_monitor.refresh().await?;
    Ok(Json(stats))
}

/// Build queue monitoring routes
pub fn queue_routes() -> Router<AppState> {
    Router::new()
        .route("/queue/stats", get(queue_stats))
        .route("/queue/stats/refresh", post(refresh_queue_stats))
}
