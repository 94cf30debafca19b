//! Periodic task scheduling
//!
//! Timer plus cancellation token, decoupled from any UI or handler. The
//! first tick fires immediately so freshly started services have data
//! before the first interval elapses.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawn a named periodic task
///
/// The task runs once immediately, then on every interval tick, until the
/// token is cancelled. Missed ticks are delayed, not bursted.
pub fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    task: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(task = name, period_secs = period.as_secs(), "Periodic task started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(task = name, "Periodic task stopped");
                    break;
                }
                _ = interval.tick() => {
                    task().await;
                }
            }
        }
    })
}
