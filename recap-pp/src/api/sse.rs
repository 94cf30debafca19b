//! Server-Sent Events endpoint
//!
//! Streams pipeline events (status changes, stage completions, queue
//! stats, sweep reports) to connected dashboards.

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::AppState;

/// GET /events - SSE stream of all pipeline events
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    recap_common::sse::event_bus_sse_stream("recap-pp", &state.event_bus)
}
