//! Size-based routing between processing paths
//!
//! Fallback order is data, not control flow: the router produces an
//! ordered list of strategies and the attempt chain tries them in
//! sequence, stopping at the first success.

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, UpstreamError, UpstreamKind};

/// One way of executing the transcription stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStrategy {
    /// Standard path: single synchronous provider call
    Inline,
    /// Dedicated higher-capacity backend for large files
    LargeFileBackend,
    /// Chunked/edge-style processing, the large path's fallback
    ChunkedFallback,
}

impl ProcessingStrategy {
    /// Stable name for logs and API responses
    pub fn name(&self) -> &'static str {
        match self {
            ProcessingStrategy::Inline => "inline",
            ProcessingStrategy::LargeFileBackend => "large_file_backend",
            ProcessingStrategy::ChunkedFallback => "chunked_fallback",
        }
    }
}

impl std::fmt::Display for ProcessingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered candidate strategies for one recording: primary first, then
/// fallback(s)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePlan {
    strategies: Vec<ProcessingStrategy>,
}

impl RoutePlan {
    /// The preferred strategy
    pub fn primary(&self) -> ProcessingStrategy {
        self.strategies[0]
    }

    /// All candidates in attempt order
    pub fn strategies(&self) -> &[ProcessingStrategy] {
        &self.strategies
    }

    /// Whether this plan takes the large-file path
    pub fn is_large_file(&self) -> bool {
        self.primary() == ProcessingStrategy::LargeFileBackend
    }
}

/// Decides which processing path a recording takes based on file size
#[derive(Debug, Clone)]
pub struct SizeRouter {
    transcribe_max_bytes: i64,
    large_file_threshold_bytes: i64,
}

impl SizeRouter {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            transcribe_max_bytes: config.transcribe_max_bytes,
            large_file_threshold_bytes: config.large_file_threshold_bytes,
        }
    }

    /// Route a file size to its candidate strategy list
    ///
    /// Unknown sizes take the standard path.
    pub fn route(&self, file_size: Option<i64>) -> RoutePlan {
        match file_size {
            Some(size) if size >= self.large_file_threshold_bytes => RoutePlan {
                strategies: vec![
                    ProcessingStrategy::LargeFileBackend,
                    ProcessingStrategy::ChunkedFallback,
                ],
            },
            _ => RoutePlan {
                strategies: vec![ProcessingStrategy::Inline],
            },
        }
    }

    /// Reject files over the transcription service's hard ceiling
    ///
    /// Called before any network call is made. Unknown sizes pass; the
    /// provider enforces its own limit in that case.
    pub fn check_transcribable(&self, file_size: Option<i64>) -> Result<(), PipelineError> {
        match file_size {
            Some(size) if size > self.transcribe_max_bytes => Err(PipelineError::FileTooLarge {
                size,
                limit: self.transcribe_max_bytes,
            }),
            _ => Ok(()),
        }
    }
}

/// Try each strategy in plan order, returning the first success
///
/// Persistence errors abort immediately (a fallback cannot fix a broken
/// store). When every strategy fails, the failures are aggregated into a
/// single upstream error so the caller sees the whole chain.
pub async fn attempt_chain<T, F, Fut>(
    service: &'static str,
    plan: &RoutePlan,
    mut attempt: F,
) -> Result<T, PipelineError>
where
    F: FnMut(ProcessingStrategy) -> Fut,
    Fut: std::future::Future<Output = Result<T, PipelineError>>,
{
    let mut failures: Vec<(ProcessingStrategy, PipelineError)> = Vec::new();

    for &strategy in plan.strategies() {
        tracing::debug!(service, strategy = %strategy, "Attempting strategy");
        match attempt(strategy).await {
            Ok(value) => {
                if !failures.is_empty() {
                    tracing::info!(
                        service,
                        strategy = %strategy,
                        failed_attempts = failures.len(),
                        "Strategy succeeded after fallback"
                    );
                }
                return Ok(value);
            }
            Err(err) if err.is_persistence() => return Err(err),
            Err(err) => {
                tracing::warn!(service, strategy = %strategy, error = %err, "Strategy failed");
                failures.push((strategy, err));
            }
        }
    }

    match failures.len() {
        0 => Err(PipelineError::Validation(format!(
            "{}: empty strategy plan",
            service
        ))),
        1 => {
            let (_, err) = failures.pop().expect("single failure");
            Err(err)
        }
        _ => {
            let kind = failures
                .iter()
                .map(|(_, err)| match err {
                    PipelineError::Upstream(u) => u.kind,
                    _ => UpstreamKind::InvalidResponse,
                })
                .last()
                .unwrap_or(UpstreamKind::InvalidResponse);
            let detail = failures
                .iter()
                .map(|(strategy, err)| format!("{}: {}", strategy, err))
                .collect::<Vec<_>>()
                .join("; ");
            Err(PipelineError::Upstream(UpstreamError {
                service,
                kind,
                detail: format!("all strategies failed ({})", detail),
            }))
        }
    }
}
