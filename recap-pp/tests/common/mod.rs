//! Shared test helpers: temp-file database pools, mock providers, and
//! fixture recordings.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tempfile::TempDir;

use recap_common::events::EventBus;
use recap_pp::config::AppConfig;
use recap_pp::error::{PipelineError, UpstreamError, UpstreamKind};
use recap_pp::models::{Recording, RecordingStatus};
use recap_pp::services::{
    AnalysisRequest, AnalysisResult, Analyzer, ProcessingStrategy, Transcriber,
    TranscriptionRequest,
};
use recap_pp::AppState;

pub const MIB: i64 = 1024 * 1024;

/// Fresh file-backed SQLite pool with the service schema
///
/// The TempDir must stay alive for the duration of the test.
pub async fn test_pool() -> (TempDir, SqlitePool) {
    let dir = TempDir::new().expect("create temp dir");
    let db_path = dir.path().join("recap-test.db");
    let pool = recap_pp::db::init_database_pool(&db_path)
        .await
        .expect("init test database");
    (dir, pool)
}

/// Transcriber double with programmable per-strategy behavior
pub struct MockTranscriber {
    calls: AtomicUsize,
    #[allow(clippy::type_complexity)]
    behavior: Box<dyn Fn(ProcessingStrategy) -> Result<String, PipelineError> + Send + Sync>,
}

impl MockTranscriber {
    /// Succeeds on every strategy with the given transcript
    pub fn ok(text: &str) -> Arc<Self> {
        let text = text.to_string();
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            behavior: Box::new(move |_| Ok(text.clone())),
        })
    }

    /// Fails on every strategy with the given upstream detail
    pub fn failing(kind: UpstreamKind, detail: &str) -> Arc<Self> {
        let detail = detail.to_string();
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            behavior: Box::new(move |_| {
                Err(PipelineError::Upstream(UpstreamError {
                    service: "transcription",
                    kind,
                    detail: detail.clone(),
                }))
            }),
        })
    }

    /// Large-file backend errors; other strategies succeed
    pub fn backend_down(text: &str) -> Arc<Self> {
        let text = text.to_string();
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            behavior: Box::new(move |strategy| {
                if strategy == ProcessingStrategy::LargeFileBackend {
                    Err(PipelineError::Upstream(UpstreamError {
                        service: "transcription",
                        kind: UpstreamKind::InvalidResponse,
                        detail: "large-file backend unreachable".to_string(),
                    }))
                } else {
                    Ok(text.clone())
                }
            }),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(
        &self,
        _request: &TranscriptionRequest,
        strategy: ProcessingStrategy,
    ) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.behavior)(strategy)
    }
}

/// Analyzer double
pub struct MockAnalyzer {
    calls: AtomicUsize,
    result: Result<AnalysisResult, (UpstreamKind, String)>,
}

impl MockAnalyzer {
    pub fn ok(summary: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            result: Ok(AnalysisResult {
                summary: summary.to_string(),
                insights: Some(serde_json::json!({"sentiment": "positive"})),
                coaching_evaluation: Some(serde_json::json!({"talk_ratio": 0.4})),
            }),
        })
    }

    pub fn failing(kind: UpstreamKind, detail: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            result: Err((kind, detail.to_string())),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Analyzer for MockAnalyzer {
    async fn analyze(&self, _request: &AnalysisRequest) -> Result<AnalysisResult, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result {
            Ok(result) => Ok(result.clone()),
            Err((kind, detail)) => Err(PipelineError::Upstream(UpstreamError {
                service: "analysis",
                kind: *kind,
                detail: detail.clone(),
            })),
        }
    }
}

/// Build an AppState around the given pool and provider doubles
pub fn make_state(
    pool: SqlitePool,
    transcriber: Arc<MockTranscriber>,
    analyzer: Arc<MockAnalyzer>,
) -> AppState {
    let config = AppConfig::default();
    AppState::new(pool, EventBus::new(100), &config, transcriber, analyzer)
}

/// Insert a fixture recording with the given status and size
pub async fn insert_recording(
    pool: &SqlitePool,
    status: RecordingStatus,
    file_size: Option<i64>,
) -> Recording {
    let mut recording = Recording::new(
        "Test call".to_string(),
        "s3://recordings/test-call.mp4".to_string(),
        file_size,
    );
    recording.status = status;
    recap_pp::db::recordings::insert(pool, &recording)
        .await
        .expect("insert fixture recording");
    recording
}

/// Insert a fixture recording aged by `minutes`, optionally with partial
/// results already persisted
pub async fn insert_aged_recording(
    pool: &SqlitePool,
    status: RecordingStatus,
    age_minutes: i64,
    transcript: Option<&str>,
    summary: Option<&str>,
) -> Recording {
    let mut recording = Recording::new(
        "Aged call".to_string(),
        "s3://recordings/aged-call.mp4".to_string(),
        Some(8 * MIB),
    );
    recording.status = status;
    recording.created_at = chrono::Utc::now() - chrono::Duration::minutes(age_minutes);
    recording.updated_at = recording.created_at;
    recording.transcript = transcript.map(|s| s.to_string());
    recording.ai_summary = summary.map(|s| s.to_string());
    recap_pp::db::recordings::insert(pool, &recording)
        .await
        .expect("insert aged recording");
    recording
}

/// Reload a recording row
pub async fn reload(pool: &SqlitePool, id: uuid::Uuid) -> Recording {
    recap_pp::db::recordings::get(pool, id)
        .await
        .expect("reload recording")
        .expect("recording exists")
}
