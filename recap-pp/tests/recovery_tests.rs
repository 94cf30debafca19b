//! Recovery scanner integration tests
//!
//! Sweep repair rules, staleness handling, and the single-id
//! reset-and-redispatch path.

mod common;

use common::*;
use recap_pp::error::PipelineError;
use recap_pp::models::RecordingStatus;
use recap_pp::services::SweepAction;

#[tokio::test]
async fn test_sweep_completes_recording_with_full_results() {
    let (_dir, pool) = test_pool().await;
    let transcriber = MockTranscriber::ok("never used");
    let analyzer = MockAnalyzer::ok("never used");
    let state = make_state(pool.clone(), transcriber.clone(), analyzer.clone());

    // Final write crashed 45 minutes ago, after both results landed
    let recording = insert_aged_recording(
        &pool,
        RecordingStatus::Processing,
        45,
        Some("transcript"),
        Some("summary"),
    )
    .await;

    let report = state.recovery.sweep().await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.count(SweepAction::CompletedFromResults), 1);

    let row = reload(&pool, recording.id).await;
    assert_eq!(row.status, RecordingStatus::Completed);
    assert_eq!(row.processing_progress, 100);
    // Repair is a pure status fix: no provider calls
    assert_eq!(transcriber.calls(), 0);
    assert_eq!(analyzer.calls(), 0);
}

#[tokio::test]
async fn test_sweep_restores_transcribed_for_partial_results() {
    let (_dir, pool) = test_pool().await;
    let state = make_state(
        pool.clone(),
        MockTranscriber::ok("never used"),
        MockAnalyzer::ok("never used"),
    );

    let recording = insert_aged_recording(
        &pool,
        RecordingStatus::Transcribing,
        45,
        Some("transcript only"),
        None,
    )
    .await;

    let report = state.recovery.sweep().await.unwrap();
    assert_eq!(report.count(SweepAction::RestoredTranscribed), 1);

    let row = reload(&pool, recording.id).await;
    assert_eq!(row.status, RecordingStatus::Transcribed);
    assert_eq!(row.processing_progress, 75);
}

#[tokio::test]
async fn test_sweep_fails_stale_recording_with_timeout_message() {
    let (_dir, pool) = test_pool().await;
    let state = make_state(
        pool.clone(),
        MockTranscriber::ok("never used"),
        MockAnalyzer::ok("never used"),
    );

    let recording =
        insert_aged_recording(&pool, RecordingStatus::Processing, 45, None, None).await;

    let report = state.recovery.sweep().await.unwrap();
    assert_eq!(report.count(SweepAction::TimedOut), 1);

    let row = reload(&pool, recording.id).await;
    assert_eq!(row.status, RecordingStatus::Failed);
    assert!(row
        .error_message
        .unwrap()
        .contains("Processing timeout after 45 minutes"));
}

#[tokio::test]
async fn test_sweep_leaves_young_recording_untouched() {
    let (_dir, pool) = test_pool().await;
    let state = make_state(
        pool.clone(),
        MockTranscriber::ok("never used"),
        MockAnalyzer::ok("never used"),
    );

    let recording =
        insert_aged_recording(&pool, RecordingStatus::Processing, 5, None, None).await;

    let report = state.recovery.sweep().await.unwrap();
    assert_eq!(report.count(SweepAction::StillProcessing), 1);

    let row = reload(&pool, recording.id).await;
    // No state change, but the estimate annotation is written
    assert_eq!(row.status, RecordingStatus::Processing);
    assert!(row.processing_notes.unwrap().contains("still processing"));
    assert!(row.error_message.is_none());
}

#[tokio::test]
async fn test_sweep_ignores_non_working_states() {
    let (_dir, pool) = test_pool().await;
    let state = make_state(
        pool.clone(),
        MockTranscriber::ok("never used"),
        MockAnalyzer::ok("never used"),
    );

    insert_recording(&pool, RecordingStatus::Pending, Some(MIB)).await;
    insert_recording(&pool, RecordingStatus::Completed, Some(MIB)).await;
    insert_recording(&pool, RecordingStatus::Failed, Some(MIB)).await;
    insert_recording(&pool, RecordingStatus::Transcribed, Some(MIB)).await;

    let report = state.recovery.sweep().await.unwrap();
    assert_eq!(report.scanned, 0);
}

#[tokio::test]
async fn test_sweep_handles_mixed_candidates_independently() {
    let (_dir, pool) = test_pool().await;
    let state = make_state(
        pool.clone(),
        MockTranscriber::ok("never used"),
        MockAnalyzer::ok("never used"),
    );

    let done = insert_aged_recording(
        &pool,
        RecordingStatus::Processing,
        45,
        Some("t"),
        Some("s"),
    )
    .await;
    let stale = insert_aged_recording(&pool, RecordingStatus::Transcribing, 60, None, None).await;
    let young = insert_aged_recording(&pool, RecordingStatus::Processing, 2, None, None).await;

    let report = state.recovery.sweep().await.unwrap();
    assert_eq!(report.scanned, 3);
    assert_eq!(report.repaired(), 1);
    assert_eq!(report.count(SweepAction::TimedOut), 1);
    assert_eq!(report.count(SweepAction::StillProcessing), 1);

    assert_eq!(reload(&pool, done.id).await.status, RecordingStatus::Completed);
    assert_eq!(reload(&pool, stale.id).await.status, RecordingStatus::Failed);
    assert_eq!(reload(&pool, young.id).await.status, RecordingStatus::Processing);
}

#[tokio::test]
async fn test_recover_one_rejects_young_recording_without_force() {
    let (_dir, pool) = test_pool().await;
    let state = make_state(
        pool.clone(),
        MockTranscriber::ok("never used"),
        MockAnalyzer::ok("never used"),
    );

    let recording =
        insert_aged_recording(&pool, RecordingStatus::Processing, 5, None, None).await;

    let result = state
        .recovery
        .recover_one(&state.processing, recording.id, false)
        .await;
    assert!(matches!(result, Err(PipelineError::NotStuck { .. })));

    // Declined recovery never mutates the row
    let row = reload(&pool, recording.id).await;
    assert_eq!(row.status, RecordingStatus::Processing);
    assert!(row.error_message.is_none());
}

#[tokio::test]
async fn test_recover_one_force_resets_and_redispatches() {
    let (_dir, pool) = test_pool().await;
    let transcriber = MockTranscriber::ok("recovered transcript");
    let analyzer = MockAnalyzer::ok("recovered summary");
    let state = make_state(pool.clone(), transcriber.clone(), analyzer.clone());

    let recording =
        insert_aged_recording(&pool, RecordingStatus::Processing, 5, None, None).await;

    let outcome = state
        .recovery
        .recover_one(&state.processing, recording.id, true)
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.previous_status, RecordingStatus::Processing);
    assert_eq!(outcome.retry_method, "inline");
    assert_eq!(outcome.status, RecordingStatus::Completed);

    let row = reload(&pool, recording.id).await;
    assert_eq!(row.status, RecordingStatus::Completed);
    assert_eq!(row.transcript.as_deref(), Some("recovered transcript"));
    assert_eq!(transcriber.calls(), 1);
    assert_eq!(analyzer.calls(), 1);
}

#[tokio::test]
async fn test_recover_one_stale_recording_without_force() {
    let (_dir, pool) = test_pool().await;
    let transcriber = MockTranscriber::ok("late transcript");
    let analyzer = MockAnalyzer::ok("late summary");
    let state = make_state(pool.clone(), transcriber.clone(), analyzer.clone());

    let recording =
        insert_aged_recording(&pool, RecordingStatus::Transcribing, 45, None, None).await;

    let outcome = state
        .recovery
        .recover_one(&state.processing, recording.id, false)
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.previous_status, RecordingStatus::Transcribing);
    assert_eq!(reload(&pool, recording.id).await.status, RecordingStatus::Completed);
}

#[tokio::test]
async fn test_recover_one_uses_large_file_plan_for_large_recordings() {
    let (_dir, pool) = test_pool().await;
    let transcriber = MockTranscriber::backend_down("chunked recovery transcript");
    let analyzer = MockAnalyzer::ok("summary");
    let state = make_state(pool.clone(), transcriber.clone(), analyzer.clone());

    let mut recording = recap_pp::models::Recording::new(
        "Big call".to_string(),
        "s3://recordings/big-call.mp4".to_string(),
        Some(80 * MIB),
    );
    recording.status = RecordingStatus::ProcessingLargeFile;
    recording.created_at = chrono::Utc::now() - chrono::Duration::minutes(45);
    recap_pp::db::recordings::insert(&pool, &recording).await.unwrap();

    let outcome = state
        .recovery
        .recover_one(&state.processing, recording.id, false)
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.retry_method, "large_file_backend");
    // Re-dispatch walks the same candidate list: backend, then chunked
    assert_eq!(transcriber.calls(), 2);
}

#[tokio::test]
async fn test_recover_one_rejects_terminal_recording() {
    let (_dir, pool) = test_pool().await;
    let state = make_state(
        pool.clone(),
        MockTranscriber::ok("never used"),
        MockAnalyzer::ok("never used"),
    );

    let recording = insert_recording(&pool, RecordingStatus::Completed, Some(MIB)).await;

    let result = state
        .recovery
        .recover_one(&state.processing, recording.id, true)
        .await;
    assert!(matches!(result, Err(PipelineError::Validation(_))));
}

#[tokio::test]
async fn test_recover_one_unknown_recording() {
    let (_dir, pool) = test_pool().await;
    let state = make_state(
        pool.clone(),
        MockTranscriber::ok("never used"),
        MockAnalyzer::ok("never used"),
    );

    let result = state
        .recovery
        .recover_one(&state.processing, uuid::Uuid::new_v4(), true)
        .await;
    assert!(matches!(result, Err(PipelineError::Validation(_))));
}
