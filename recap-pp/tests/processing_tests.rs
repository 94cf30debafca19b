//! Processing client integration tests
//!
//! Exercise the full stage sequence against a real (temp-file) database
//! with mock providers.

mod common;

use common::*;
use recap_pp::error::{PipelineError, UpstreamKind};
use recap_pp::models::{JobStatus, RecordingStatus};

#[tokio::test]
async fn test_standard_path_reaches_completed() {
    let (_dir, pool) = test_pool().await;
    let transcriber = MockTranscriber::ok("hello, thanks for calling");
    let analyzer = MockAnalyzer::ok("Intro call summary");
    let state = make_state(pool.clone(), transcriber.clone(), analyzer.clone());

    let recording = insert_recording(&pool, RecordingStatus::Pending, Some(5 * MIB)).await;

    let outcome = state.processing.process(recording.id).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.status, RecordingStatus::Completed);

    let row = reload(&pool, recording.id).await;
    assert_eq!(row.status, RecordingStatus::Completed);
    assert_eq!(row.transcript.as_deref(), Some("hello, thanks for calling"));
    assert_eq!(row.ai_summary.as_deref(), Some("Intro call summary"));
    assert!(row.ai_insights.is_some());
    assert!(row.coaching_evaluation.is_some());
    assert_eq!(row.processing_progress, 100);
    assert!(row.error_message.is_none());
    // Stage timings recorded
    let notes = row.processing_notes.unwrap();
    assert!(notes.contains("transcription completed in"));
    assert!(notes.contains("analysis completed in"));

    assert_eq!(transcriber.calls(), 1);
    assert_eq!(analyzer.calls(), 1);
}

#[tokio::test]
async fn test_large_file_falls_back_to_chunked_path() {
    let (_dir, pool) = test_pool().await;
    let transcriber = MockTranscriber::backend_down("large transcript");
    let analyzer = MockAnalyzer::ok("Large call summary");
    let state = make_state(pool.clone(), transcriber.clone(), analyzer.clone());

    let recording = insert_recording(&pool, RecordingStatus::Pending, Some(80 * MIB)).await;

    let outcome = state.processing.process(recording.id).await.unwrap();
    assert!(outcome.success);

    let row = reload(&pool, recording.id).await;
    assert_eq!(row.status, RecordingStatus::Completed);
    assert_eq!(row.transcript.as_deref(), Some("large transcript"));
    // Backend attempt plus the chunked fallback
    assert_eq!(transcriber.calls(), 2);
    // Which strategy finished the stage is visible in the notes
    assert!(row
        .processing_notes
        .unwrap()
        .contains("via chunked_fallback"));
}

#[tokio::test]
async fn test_large_file_claims_large_file_status() {
    let (_dir, pool) = test_pool().await;
    let transcriber = MockTranscriber::failing(UpstreamKind::Timeout, "all paths down");
    let analyzer = MockAnalyzer::ok("unused");
    let state = make_state(pool.clone(), transcriber.clone(), analyzer.clone());

    let recording = insert_recording(&pool, RecordingStatus::Pending, Some(80 * MIB)).await;
    let outcome = state.processing.process(recording.id).await.unwrap();

    // Both strategies tried, both failed, classified failure persisted:
    // the job is never silently dropped
    assert!(!outcome.success);
    assert_eq!(transcriber.calls(), 2);
    let row = reload(&pool, recording.id).await;
    assert_eq!(row.status, RecordingStatus::TranscriptionFailed);
    assert!(row.error_message.unwrap().contains("all strategies failed"));
}

#[tokio::test]
async fn test_file_over_ceiling_fails_before_any_call() {
    let (_dir, pool) = test_pool().await;
    let transcriber = MockTranscriber::ok("never used");
    let analyzer = MockAnalyzer::ok("never used");
    let state = make_state(pool.clone(), transcriber.clone(), analyzer.clone());

    let recording =
        insert_recording(&pool, RecordingStatus::Pending, Some(25 * MIB + 1)).await;

    let outcome = state.processing.process(recording.id).await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.status, RecordingStatus::TranscriptionFailed);

    let row = reload(&pool, recording.id).await;
    assert_eq!(row.status, RecordingStatus::TranscriptionFailed);
    assert!(row.error_message.unwrap().contains("File too large"));
    // The ceiling check runs before the provider is touched
    assert_eq!(transcriber.calls(), 0);
    assert_eq!(analyzer.calls(), 0);
}

#[tokio::test]
async fn test_file_at_exact_ceiling_is_accepted() {
    let (_dir, pool) = test_pool().await;
    let transcriber = MockTranscriber::ok("boundary transcript");
    let analyzer = MockAnalyzer::ok("boundary summary");
    let state = make_state(pool.clone(), transcriber.clone(), analyzer.clone());

    let recording = insert_recording(&pool, RecordingStatus::Pending, Some(25 * MIB)).await;

    let outcome = state.processing.process(recording.id).await.unwrap();
    assert!(outcome.success);
    assert_eq!(transcriber.calls(), 1);
}

#[tokio::test]
async fn test_completed_recording_is_idempotent() {
    let (_dir, pool) = test_pool().await;
    let transcriber = MockTranscriber::ok("never used");
    let analyzer = MockAnalyzer::ok("never used");
    let state = make_state(pool.clone(), transcriber.clone(), analyzer.clone());

    let recording = insert_aged_recording(
        &pool,
        RecordingStatus::Completed,
        5,
        Some("existing transcript"),
        Some("existing summary"),
    )
    .await;

    let outcome = state.processing.process(recording.id).await.unwrap();
    assert!(outcome.success);
    assert!(outcome.transcript_present);
    assert!(outcome.summary_present);

    // No upstream calls for a recording that already has results
    assert_eq!(transcriber.calls(), 0);
    assert_eq!(analyzer.calls(), 0);
}

#[tokio::test]
async fn test_transcribed_recording_skips_transcription() {
    let (_dir, pool) = test_pool().await;
    let transcriber = MockTranscriber::ok("never used");
    let analyzer = MockAnalyzer::ok("resumed summary");
    let state = make_state(pool.clone(), transcriber.clone(), analyzer.clone());

    let recording = insert_aged_recording(
        &pool,
        RecordingStatus::Transcribed,
        5,
        Some("existing transcript"),
        None,
    )
    .await;

    let outcome = state.processing.process(recording.id).await.unwrap();
    assert!(outcome.success);

    let row = reload(&pool, recording.id).await;
    assert_eq!(row.status, RecordingStatus::Completed);
    assert_eq!(row.transcript.as_deref(), Some("existing transcript"));
    assert_eq!(row.ai_summary.as_deref(), Some("resumed summary"));
    assert_eq!(transcriber.calls(), 0);
    assert_eq!(analyzer.calls(), 1);
}

#[tokio::test]
async fn test_transcription_failure_is_persisted_not_thrown() {
    let (_dir, pool) = test_pool().await;
    let transcriber =
        MockTranscriber::failing(UpstreamKind::Timeout, "stt deadline exceeded after 120s");
    let analyzer = MockAnalyzer::ok("never used");
    let state = make_state(pool.clone(), transcriber.clone(), analyzer.clone());

    let recording = insert_recording(&pool, RecordingStatus::Pending, Some(4 * MIB)).await;

    // Entry point returns an outcome, not an error
    let outcome = state.processing.process(recording.id).await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.status, RecordingStatus::TranscriptionFailed);

    let row = reload(&pool, recording.id).await;
    assert_eq!(row.status, RecordingStatus::TranscriptionFailed);
    // Upstream detail kept verbatim
    assert!(row
        .error_message
        .unwrap()
        .contains("stt deadline exceeded after 120s"));
    // Analysis never starts after a transcription failure
    assert_eq!(analyzer.calls(), 0);
}

#[tokio::test]
async fn test_analysis_failure_keeps_transcript() {
    let (_dir, pool) = test_pool().await;
    let transcriber = MockTranscriber::ok("good transcript");
    let analyzer = MockAnalyzer::failing(UpstreamKind::RateLimited, "429 too many requests");
    let state = make_state(pool.clone(), transcriber.clone(), analyzer.clone());

    let recording = insert_recording(&pool, RecordingStatus::Pending, Some(4 * MIB)).await;

    let outcome = state.processing.process(recording.id).await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.status, RecordingStatus::ProcessingFailed);

    let row = reload(&pool, recording.id).await;
    assert_eq!(row.status, RecordingStatus::ProcessingFailed);
    // The transcription stage's work survives the analysis failure
    assert_eq!(row.transcript.as_deref(), Some("good transcript"));
    assert!(row.error_message.unwrap().contains("429 too many requests"));
}

#[tokio::test]
async fn test_terminal_failure_state_requires_recovery() {
    let (_dir, pool) = test_pool().await;
    let transcriber = MockTranscriber::ok("never used");
    let analyzer = MockAnalyzer::ok("never used");
    let state = make_state(pool.clone(), transcriber.clone(), analyzer.clone());

    let recording = insert_recording(&pool, RecordingStatus::Failed, Some(4 * MIB)).await;

    let outcome = state.processing.process(recording.id).await.unwrap();
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("recovery is required"));
    assert_eq!(transcriber.calls(), 0);

    // No job row is opened for a declined dispatch
    let jobs = recap_pp::db::jobs::latest(&pool, 10).await.unwrap();
    assert!(jobs.is_empty());
}

#[tokio::test]
async fn test_unknown_recording_is_a_validation_error() {
    let (_dir, pool) = test_pool().await;
    let transcriber = MockTranscriber::ok("never used");
    let analyzer = MockAnalyzer::ok("never used");
    let state = make_state(pool.clone(), transcriber, analyzer);

    let result = state.processing.process(uuid::Uuid::new_v4()).await;
    assert!(matches!(result, Err(PipelineError::Validation(_))));
}

#[tokio::test]
async fn test_job_row_lifecycle() {
    let (_dir, pool) = test_pool().await;
    let transcriber = MockTranscriber::ok("transcript");
    let analyzer = MockAnalyzer::ok("summary");
    let state = make_state(pool.clone(), transcriber, analyzer);

    let recording = insert_recording(&pool, RecordingStatus::Pending, Some(4 * MIB)).await;
    state.processing.process(recording.id).await.unwrap();

    let jobs = recap_pp::db::jobs::latest(&pool, 10).await.unwrap();
    assert_eq!(jobs.len(), 1);
    let job = &jobs[0];
    assert_eq!(job.recording_id, recording.id);
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.start_time.is_some());
    assert!(job.end_time.is_some());
    assert!(job.start_time.unwrap() >= job.created_at);
    assert!(job.end_time.unwrap() >= job.start_time.unwrap());
}

#[tokio::test]
async fn test_failed_attempt_closes_job_as_failed() {
    let (_dir, pool) = test_pool().await;
    let transcriber = MockTranscriber::failing(UpstreamKind::InvalidResponse, "bad gateway");
    let analyzer = MockAnalyzer::ok("never used");
    let state = make_state(pool.clone(), transcriber, analyzer);

    let recording = insert_recording(&pool, RecordingStatus::Pending, Some(4 * MIB)).await;
    state.processing.process(recording.id).await.unwrap();

    let jobs = recap_pp::db::jobs::latest(&pool, 10).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Failed);
    assert!(jobs[0].end_time.is_some());
}
