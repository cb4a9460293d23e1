mod common;

use std::path::{Path, PathBuf};

use corroscan_lib::{
    analysis::SubmitRequest,
    db::{AuditAction, AuditQuery, BatchStatus},
    settings::{AppSettings, LatencyRange},
    AppState,
};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

fn offline_state(dir: &Path) -> AppState {
    AppState::with_settings(
        dir.join("data"),
        AppSettings {
            demo_data: false,
            simulated_latency_ms: LatencyRange { min: 0, max: 0 },
            ..AppSettings::default()
        },
    )
    .unwrap()
}

fn write_images(dir: &Path, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let path = dir.join(format!("piece_{i}.png"));
            std::fs::write(&path, common::sample_png(32, 24)).unwrap();
            path
        })
        .collect()
}

#[tokio::test]
async fn processes_every_file_under_one_batch() {
    let dir = tempdir().unwrap();
    let state = offline_state(dir.path());
    let files = write_images(dir.path(), 3);

    let batch = state
        .batches
        .process(files, SubmitRequest::default(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(batch.status, BatchStatus::Completed);
    assert_eq!(batch.total_files, 3);
    assert_eq!(batch.processed_files, 3);
    assert_eq!(batch.failed_files, 0);
    assert!(batch.name.ends_with(" - 3 items"));
    assert_eq!(batch.analyses.len(), 3);
    assert!(batch
        .analyses
        .iter()
        .all(|a| a.batch_id.as_deref() == Some(batch.id.as_str())));
    assert_eq!(batch.analyses[0].original_filename, "piece_0.png");

    let summary = batch.summary.unwrap();
    assert_eq!(summary.total(), 3);
    let expected = batch
        .analyses
        .iter()
        .map(|a| a.corrosion_percentage)
        .sum::<f64>()
        / 3.0;
    assert!((batch.average_corrosion.unwrap() - expected).abs() < 0.01);

    let listed = state.batches.list_batches().await.unwrap();
    assert_eq!(listed[0].id, batch.id);
}

#[tokio::test]
async fn failed_files_are_counted_and_mark_the_batch() {
    let dir = tempdir().unwrap();
    let state = offline_state(dir.path());
    let mut files = write_images(dir.path(), 2);
    files.insert(1, dir.path().join("missing.png"));
    let unsupported = dir.path().join("scan.gif");
    std::fs::write(&unsupported, b"GIF89a").unwrap();
    files.push(unsupported);

    let batch = state
        .batches
        .process(files, SubmitRequest::default(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(batch.status, BatchStatus::Error);
    assert_eq!(batch.total_files, 4);
    assert_eq!(batch.processed_files, 4);
    assert_eq!(batch.failed_files, 2);
    assert_eq!(batch.analyses.len(), 2);
    assert_eq!(batch.summary.unwrap().total(), 2);
}

#[tokio::test]
async fn cancelled_batch_stops_before_the_next_file() {
    let dir = tempdir().unwrap();
    let state = offline_state(dir.path());
    let files = write_images(dir.path(), 2);

    let token = CancellationToken::new();
    token.cancel();
    let batch = state
        .batches
        .process(files, SubmitRequest::default(), token)
        .await
        .unwrap();

    assert_eq!(batch.status, BatchStatus::Error);
    assert_eq!(batch.processed_files, 0);
    assert!(batch.analyses.is_empty());
    assert!(batch.average_corrosion.is_none());
}

#[tokio::test]
async fn empty_batches_are_rejected() {
    let dir = tempdir().unwrap();
    let state = offline_state(dir.path());
    assert!(state
        .batches
        .process(Vec::new(), SubmitRequest::default(), CancellationToken::new())
        .await
        .is_err());
    assert!(state.batches.list_batches().await.unwrap().is_empty());
}

#[tokio::test]
async fn manual_batches_start_pending() {
    let dir = tempdir().unwrap();
    let state = offline_state(dir.path());

    let batch = state.batches.create_batch("Line 3 morning").await.unwrap();
    assert_eq!(batch.status, BatchStatus::Pending);
    assert_eq!(batch.total_files, 0);

    let loaded = state.batches.get_batch(&batch.id).await.unwrap().unwrap();
    assert_eq!(loaded.name, "Line 3 morning");
    assert!(state.batches.create_batch("   ").await.is_err());
}

#[tokio::test]
async fn batch_runs_are_audited() {
    let dir = tempdir().unwrap();
    let state = offline_state(dir.path());
    let batch = state
        .batches
        .process(
            write_images(dir.path(), 1),
            SubmitRequest::default(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let events = state
        .audit
        .list(AuditQuery {
            action: Some(AuditAction::Analyze),
            ..AuditQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].resource_id.as_deref(), Some(batch.id.as_str()));
    assert_eq!(events[0].resource_type.as_deref(), Some("batch"));
    assert_eq!(events[0].details["processedFiles"], 1);
}
