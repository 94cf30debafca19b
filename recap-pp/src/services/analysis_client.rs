//! Analysis service client
//!
//! The analysis capability is opaque: transcript in, summary plus
//! structured insights and coaching evaluation out. Shorter call bound
//! than transcription.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::config::{PipelineConfig, ProviderConfig};
use crate::error::{PipelineError, UpstreamError, UpstreamKind};
use crate::services::transcription_client::classify_reqwest_error;

const SERVICE: &str = "analysis";

/// Analysis input
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    /// Recording being analyzed
    pub recording_id: Uuid,
    /// Transcript to summarize and coach on
    pub transcript: String,
}

/// Analysis output persisted onto the recording row
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisResult {
    /// Narrative summary
    pub summary: String,
    /// Structured insights (JSON)
    #[serde(default)]
    pub insights: Option<serde_json::Value>,
    /// Structured coaching evaluation (JSON)
    #[serde(default)]
    pub coaching_evaluation: Option<serde_json::Value>,
}

/// Analysis capability seam
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Produce summary/insights/coaching for a transcript
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, PipelineError>;
}

/// HTTP analysis client
pub struct HttpAnalysisClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    call_timeout: Duration,
}

impl HttpAnalysisClient {
    pub fn new(providers: &ProviderConfig, pipeline: &PipelineConfig) -> anyhow::Result<Self> {
        let call_timeout = pipeline.analysis_timeout();
        let http = reqwest::Client::builder()
            .timeout(call_timeout + Duration::from_secs(5))
            .build()?;

        Ok(Self {
            http,
            base_url: providers.analysis_url.trim_end_matches('/').to_string(),
            api_key: providers.api_key.clone(),
            call_timeout,
        })
    }
}

#[async_trait]
impl Analyzer for HttpAnalysisClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, PipelineError> {
        let url = format!("{}/v1/analyses", self.base_url);
        tracing::debug!(recording_id = %request.recording_id, url = %url, "Calling analysis service");

        let mut builder = self.http.post(&url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = tokio::time::timeout(self.call_timeout, builder.send())
            .await
            .map_err(|_| UpstreamError {
                service: SERVICE,
                kind: UpstreamKind::Timeout,
                detail: format!(
                    "analysis call exceeded {} s deadline",
                    self.call_timeout.as_secs()
                ),
            })?
            .map_err(|e| classify_reqwest_error(SERVICE, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| UpstreamError {
            service: SERVICE,
            kind: UpstreamKind::InvalidResponse,
            detail: format!("failed to read response body: {}", e),
        })?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(UpstreamError {
                service: SERVICE,
                kind: UpstreamKind::RateLimited,
                detail: body,
            }
            .into());
        }
        if !status.is_success() {
            return Err(UpstreamError {
                service: SERVICE,
                kind: UpstreamKind::InvalidResponse,
                detail: format!("HTTP {}: {}", status.as_u16(), body),
            }
            .into());
        }

        serde_json::from_str(&body).map_err(|e| {
            UpstreamError {
                service: SERVICE,
                kind: UpstreamKind::InvalidResponse,
                detail: format!("unparseable analysis response: {}", e),
            }
            .into()
        })
    }
}
