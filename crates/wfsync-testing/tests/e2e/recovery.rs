//! End-to-end test: restarts, read failures and undecodable logs.

use serde_json::json;
use std::sync::Arc;
use wfsync::{EventHandler, SYNCER_NAME};
use wfsync_engine::Service;
use wfsync_store::CursorStorage;
use wfsync_testing::{
    eventually, owner, RecordingHandler, SyncHarness, WorkflowFixture, DON_ID, REGISTRY_ADDRESS,
};
use wfsync_types::{EventType, WorkflowStatus};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cursor_is_checkpointed_to_the_store() {
    let h = SyncHarness::builder().checkpoints().build();
    h.register(&WorkflowFixture::new("wf", DON_ID), WorkflowStatus::Paused);

    h.start().await.unwrap();
    assert!(h.caught_up().await);
    assert_eq!(
        h.store.load_cursor(REGISTRY_ADDRESS).await.unwrap(),
        Some(h.ledger.head())
    );

    let position = h.ledger.pause(&owner(), "wf");
    assert!(h.sync().await);
    assert_eq!(
        h.store.load_cursor(REGISTRY_ADDRESS).await.unwrap(),
        Some(position)
    );

    h.close().await.unwrap();
}

#[tokio::test]
async fn restart_resumes_from_the_checkpoint() {
    let first = SyncHarness::builder().checkpoints().build();
    first.register(&WorkflowFixture::new("a", DON_ID), WorkflowStatus::Paused);
    first.register(&WorkflowFixture::new("b", DON_ID), WorkflowStatus::Paused);
    first.start().await.unwrap();
    assert!(first.caught_up().await);
    first.close().await.unwrap();
    let checkpoint = first.ledger.head();

    // The registry moves on while the node is down
    let late = first.register(&WorkflowFixture::new("c", DON_ID), WorkflowStatus::Paused);

    let recorder = RecordingHandler::new();
    let second = SyncHarness::builder()
        .ledger(first.ledger.clone())
        .store(first.store.clone())
        .fetcher(first.fetcher.clone())
        .handler(recorder.clone() as Arc<dyn EventHandler>)
        .checkpoints()
        .build();
    second.start().await.unwrap();

    // Backfill replays the listing but leaves the restored cursor alone
    assert!(eventually(|| recorder.len() == 3).await);
    assert_eq!(second.syncer.cursor(), Some(checkpoint));

    assert!(second.sync().await);
    let events = recorder.events();
    assert_eq!(events.len(), 4);
    assert_eq!(events[3].position, late);
    assert_eq!(events[3].event_type(), EventType::WorkflowRegistered);
    assert_eq!(events[3].workflow_name(), "c");

    second.close().await.unwrap();
}

#[tokio::test]
async fn transient_read_error_does_not_advance_the_cursor() {
    let recorder = RecordingHandler::new();
    let h = SyncHarness::builder()
        .handler(recorder.clone() as Arc<dyn EventHandler>)
        .build();
    h.start().await.unwrap();
    assert!(h.caught_up().await);
    let before = h.syncer.cursor();

    h.register(&WorkflowFixture::new("wf", DON_ID), WorkflowStatus::Paused);
    h.ledger.fail_next_reads(1);
    h.tick().await;

    assert!(eventually(|| h.syncer.last_error().is_some()).await);
    assert_eq!(h.syncer.cursor(), before);
    assert!(recorder.is_empty());
    assert!(h.syncer.health_report()[SYNCER_NAME].is_err());

    assert!(h.sync().await);
    assert_eq!(recorder.len(), 1);
    assert!(h.syncer.last_error().is_none());

    h.close().await.unwrap();
}

#[tokio::test]
async fn quiet_cycle_clears_a_read_error() {
    let h = SyncHarness::new();
    h.start().await.unwrap();
    assert!(h.caught_up().await);

    h.ledger.fail_next_reads(1);
    h.tick().await;
    assert!(eventually(|| h.syncer.last_error().is_some()).await);

    // Nothing new on the registry, the read itself succeeds
    h.tick().await;
    assert!(eventually(|| h.syncer.last_error().is_none()).await);
    assert_eq!(h.syncer.health_report()[SYNCER_NAME], Ok(()));
    assert_eq!(h.ledger.event_calls(), 2);

    h.close().await.unwrap();
}

#[tokio::test]
async fn unknown_log_type_is_skipped() {
    let recorder = RecordingHandler::new();
    let h = SyncHarness::builder()
        .handler(recorder.clone() as Arc<dyn EventHandler>)
        .build();
    h.start().await.unwrap();
    assert!(h.caught_up().await);

    h.ledger.push_log("WorkflowExplodedV1", json!({}));
    h.register(&WorkflowFixture::new("after", DON_ID), WorkflowStatus::Paused);
    assert!(h.sync().await);

    // The log after the bad one is still applied
    let names: Vec<String> = recorder
        .events()
        .iter()
        .map(|e| e.workflow_name().to_string())
        .collect();
    assert_eq!(names, vec!["after".to_string()]);

    let error = h.syncer.last_error().unwrap();
    assert!(error.contains("WorkflowExplodedV1"), "unexpected error: {}", error);

    h.close().await.unwrap();
}
