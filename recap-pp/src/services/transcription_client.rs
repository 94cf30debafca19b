//! Transcription service client
//!
//! The transcription capability is opaque: media reference in, text out.
//! The `Transcriber` trait is the seam tests mock; the HTTP client is the
//! production implementation, with one endpoint per strategy and a
//! bounded call timeout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::config::{PipelineConfig, ProviderConfig};
use crate::error::{PipelineError, UpstreamError, UpstreamKind};
use crate::services::size_router::ProcessingStrategy;

const SERVICE: &str = "transcription";

/// What the transcription provider needs to fetch and transcribe a file
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionRequest {
    /// Recording being transcribed
    pub recording_id: Uuid,
    /// Reference to the uploaded media
    pub file_url: String,
    /// Size in bytes, when known
    pub file_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Transcription capability seam
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe via the given strategy, returning the transcript text
    async fn transcribe(
        &self,
        request: &TranscriptionRequest,
        strategy: ProcessingStrategy,
    ) -> Result<String, PipelineError>;
}

/// HTTP transcription client
pub struct HttpTranscriptionClient {
    http: reqwest::Client,
    base_url: String,
    large_url: String,
    api_key: Option<String>,
    call_timeout: Duration,
}

impl HttpTranscriptionClient {
    pub fn new(providers: &ProviderConfig, pipeline: &PipelineConfig) -> anyhow::Result<Self> {
        let call_timeout = pipeline.transcribe_timeout();
        // Client-level timeout slightly above the call bound so the
        // classified timeout fires first
        let http = reqwest::Client::builder()
            .timeout(call_timeout + Duration::from_secs(5))
            .build()?;

        Ok(Self {
            http,
            base_url: providers.transcription_url.trim_end_matches('/').to_string(),
            large_url: providers
                .transcription_large_url
                .trim_end_matches('/')
                .to_string(),
            api_key: providers.api_key.clone(),
            call_timeout,
        })
    }

    fn endpoint(&self, strategy: ProcessingStrategy) -> String {
        match strategy {
            ProcessingStrategy::Inline => format!("{}/v1/transcriptions", self.base_url),
            ProcessingStrategy::LargeFileBackend => {
                format!("{}/v1/transcriptions", self.large_url)
            }
            ProcessingStrategy::ChunkedFallback => {
                format!("{}/v1/transcriptions/chunked", self.base_url)
            }
        }
    }

    async fn call(
        &self,
        url: &str,
        request: &TranscriptionRequest,
    ) -> Result<String, PipelineError> {
        let mut builder = self.http.post(url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = tokio::time::timeout(self.call_timeout, builder.send())
            .await
            .map_err(|_| UpstreamError {
                service: SERVICE,
                kind: UpstreamKind::Timeout,
                detail: format!(
                    "transcription call exceeded {} s deadline",
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

        let parsed: TranscriptionResponse =
            serde_json::from_str(&body).map_err(|e| UpstreamError {
                service: SERVICE,
                kind: UpstreamKind::InvalidResponse,
                detail: format!("unparseable transcription response: {}", e),
            })?;

        Ok(parsed.text)
    }
}

#[async_trait]
impl Transcriber for HttpTranscriptionClient {
    async fn transcribe(
        &self,
        request: &TranscriptionRequest,
        strategy: ProcessingStrategy,
    ) -> Result<String, PipelineError> {
        let url = self.endpoint(strategy);
        tracing::debug!(
            recording_id = %request.recording_id,
            strategy = %strategy,
            url = %url,
            "Calling transcription service"
        );
        self.call(&url, request).await
    }
}

/// Map reqwest failures onto the upstream taxonomy
pub(crate) fn classify_reqwest_error(service: &'static str, err: reqwest::Error) -> UpstreamError {
    let kind = if err.is_timeout() {
        UpstreamKind::Timeout
    } else {
        UpstreamKind::InvalidResponse
    };
    UpstreamError {
        service,
        kind,
        detail: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpTranscriptionClient {
        HttpTranscriptionClient::new(&ProviderConfig::default(), &PipelineConfig::default())
            .unwrap()
    }

    #[test]
    fn test_endpoint_per_strategy() {
        let client = client();
        assert_eq!(
            client.endpoint(ProcessingStrategy::Inline),
            "http://127.0.0.1:9200/v1/transcriptions"
        );
        assert_eq!(
            client.endpoint(ProcessingStrategy::LargeFileBackend),
            "http://127.0.0.1:9201/v1/transcriptions"
        );
        assert_eq!(
            client.endpoint(ProcessingStrategy::ChunkedFallback),
            "http://127.0.0.1:9200/v1/transcriptions/chunked"
        );
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let providers = ProviderConfig {
            transcription_url: "http://stt.internal/".to_string(),
            ..ProviderConfig::default()
        };
        let client = HttpTranscriptionClient::new(&providers, &PipelineConfig::default()).unwrap();
        assert_eq!(
            client.endpoint(ProcessingStrategy::Inline),
            "http://stt.internal/v1/transcriptions"
        );
    }
}
