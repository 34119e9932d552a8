/*!
 * Tests for the task registry and worker handles
 */

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use docalign::document::DocumentKind;
use docalign::errors::TrackerError;
use docalign::tracker::{ManualClock, ProgressSink, TaskId, TaskRegistry, TaskResult, TaskStatus};
use regex::Regex;

fn sample_result() -> TaskResult {
    TaskResult {
        output_path: PathBuf::from("out/report_aligned.tsv"),
        intermediate_files: vec![PathBuf::from("out/report_aligned.json")],
        row_count: 12,
        flagged_rows: 1,
        document_kind: DocumentKind::Docx,
        split_parts: 2,
        failed_chunks: Vec::new(),
        issues: Vec::new(),
        issue_count: 0,
    }
}

#[test]
fn test_create_shouldStartProcessingAtZero() {
    let registry = TaskRegistry::default();
    let id = registry.create();
    let state = registry.get(&id).unwrap();

    assert_eq!(state.status, TaskStatus::Processing);
    assert_eq!(state.progress, 0);
    assert!(state.result.is_none());
    assert!(state.error.is_none());
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_update_shouldPreserveTranscript() {
    let registry = TaskRegistry::default();
    let id = registry.create();
    registry.append_transcript(&id, "Reading documents").unwrap();
    registry.update(&id, 40, "Aligning part 1 of 2").unwrap();

    let state = registry.get(&id).unwrap();
    assert_eq!(state.progress, 40);
    assert_eq!(state.message, "Aligning part 1 of 2");
    assert!(state.transcript.contains("Reading documents"));
}

#[test]
fn test_appendTranscript_shouldPrefixClockTime() {
    let registry = TaskRegistry::default();
    let id = registry.create();
    registry.append_transcript(&id, "first").unwrap();
    registry.append_transcript(&id, "second").unwrap();

    let transcript = registry.get(&id).unwrap().transcript;
    let line = Regex::new(r"^\[\d{2}:\d{2}:\d{2}\] (first|second)$").unwrap();
    let lines: Vec<&str> = transcript.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| line.is_match(l)), "unexpected transcript: {}", transcript);
}

#[test]
fn test_update_withOutOfRangeProgress_shouldClampTo100() {
    let registry = TaskRegistry::default();
    let id = registry.create();
    registry.update(&id, 250, "overshoot").unwrap();
    assert_eq!(registry.get(&id).unwrap().progress, 100);
}

#[test]
fn test_complete_shouldStoreResultAndRejectLaterUpdates() {
    let registry = TaskRegistry::default();
    let id = registry.create();
    registry.complete(&id, sample_result(), "Aligned 12 rows").unwrap();

    let state = registry.get(&id).unwrap();
    assert_eq!(state.status, TaskStatus::Done);
    assert_eq!(state.progress, 100);
    assert_eq!(state.result.as_ref().map(|r| r.row_count), Some(12));

    assert_eq!(
        registry.update(&id, 50, "late"),
        Err(TrackerError::AlreadyTerminal(id.to_string()))
    );
    assert!(registry.fail(&id, "late failure").is_err());
    assert_eq!(registry.get(&id).unwrap().status, TaskStatus::Done);
}

#[test]
fn test_fail_shouldRecordErrorMessage() {
    let registry = TaskRegistry::default();
    let id = registry.create();
    registry.fail(&id, "No output produced: all 2 chunk(s) failed").unwrap();

    let state = registry.get(&id).unwrap();
    assert_eq!(state.status, TaskStatus::Failed);
    assert_eq!(state.error.as_deref(), Some("No output produced: all 2 chunk(s) failed"));
    assert!(state.result.is_none());
}

#[test]
fn test_requestCancel_shouldReachHandle() {
    let registry = Arc::new(TaskRegistry::default());
    let id = registry.create();
    let handle = registry.handle(&id).unwrap();

    assert!(!handle.is_cancelled());
    assert!(registry.request_cancel(&id));
    assert!(handle.is_cancelled());
    assert!(!registry.request_cancel(&TaskId::from("unknown")));
}

#[test]
fn test_requestCancel_withFinishedTask_shouldReturnFalse() {
    let registry = TaskRegistry::default();
    let id = registry.create();
    registry.fail(&id, "boom").unwrap();
    assert!(!registry.request_cancel(&id));
}

#[test]
fn test_handle_shouldWriteProgressAndWarningsToState() {
    let registry = Arc::new(TaskRegistry::default());
    let id = registry.create();
    let handle = registry.handle(&id).unwrap();

    handle.progress(30, "Aligning 2 part(s)");
    handle.warn("Response for part 2 looks truncated");
    handle.debug("not in transcript");

    let state = registry.get(&id).unwrap();
    assert_eq!(state.progress, 30);
    assert_eq!(state.message, "Aligning 2 part(s)");
    assert!(state.transcript.contains("Aligning 2 part(s)"));
    assert!(state.transcript.contains("WARNING: Response for part 2 looks truncated"));
    assert!(!state.transcript.contains("not in transcript"));
}

#[test]
fn test_handle_withUnknownTask_shouldBeNone() {
    let registry = Arc::new(TaskRegistry::default());
    assert!(registry.handle(&TaskId::from("missing")).is_none());
}

#[test]
fn test_evictFinishedOlderThan_shouldKeepRecentAndRunningTasks() {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()));
    let registry = TaskRegistry::new(clock.clone());

    let old_done = registry.create();
    registry.complete(&old_done, sample_result(), "done").unwrap();
    let running = registry.create();

    clock.advance(Duration::minutes(90));
    let recent_failed = registry.create();
    registry.fail(&recent_failed, "boom").unwrap();

    assert_eq!(registry.evict_finished_older_than(Duration::hours(1)), 1);
    assert!(registry.get(&old_done).is_none());
    assert!(registry.get(&running).is_some());
    assert!(registry.get(&recent_failed).is_some());

    assert_eq!(registry.evict(&running).map(|s| s.status), Some(TaskStatus::Processing));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_taskState_shouldSerializeLowercaseStatus() {
    let registry = TaskRegistry::default();
    let id = registry.create();
    let json = serde_json::to_value(registry.get(&id).unwrap()).unwrap();
    assert_eq!(json["status"], "processing");
}
