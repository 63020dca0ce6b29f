//! End-to-end test: syncer shutdown and startup failures.

use std::sync::Arc;
use std::time::Duration;
use wfsync::{
    EventHandler, SyncerConfig, SyncerError, TickSource, WatchDonNotifier, WorkflowRegistry,
    SYNCER_NAME,
};
use wfsync_engine::{Service, ServiceError};
use wfsync_testing::{
    eventually, owner, FakeReaderFactory, FakeRegistry, RecordingHandler, SyncHarness,
    WorkflowFixture, DON_ID, REGISTRY_ADDRESS,
};
use wfsync_types::{Don, WorkflowStatus};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn no_events_are_delivered_after_close() {
    let recorder = RecordingHandler::new();
    let h = SyncHarness::builder()
        .handler(recorder.clone() as Arc<dyn EventHandler>)
        .build();
    h.start().await.unwrap();
    assert!(h.caught_up().await);

    h.close().await.unwrap();
    h.register(&WorkflowFixture::new("late", DON_ID), WorkflowStatus::Active);
    h.tick().await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert!(recorder.is_empty());
    assert_eq!(h.ledger.event_calls(), 0);
}

#[tokio::test]
async fn engines_outlive_the_syncer_until_closed() {
    let h = SyncHarness::new();
    h.start().await.unwrap();
    assert!(h.caught_up().await);

    h.register(&WorkflowFixture::new("a", DON_ID), WorkflowStatus::Active);
    h.register(&WorkflowFixture::new("b", DON_ID), WorkflowStatus::Active);
    assert!(h.sync().await);

    h.close().await.unwrap();
    assert_eq!(h.factory.live(), 2);

    assert!(h.engines.close_all().await.is_empty());
    assert_eq!(h.factory.live(), 0);
    assert!(h.engines.is_empty());
}

#[tokio::test]
async fn close_interrupts_a_stalled_log_read() {
    let h = SyncHarness::new();
    h.start().await.unwrap();
    assert!(h.caught_up().await);

    h.ledger.stall_reads();
    h.tick().await;
    assert!(eventually(|| h.ledger.event_calls() == 1).await);

    let closed = tokio::time::timeout(Duration::from_secs(2), h.close()).await;
    assert!(matches!(closed, Ok(Ok(()))));
}

#[tokio::test]
async fn close_interrupts_a_stalled_backfill() {
    let h = SyncHarness::new();
    h.ledger.stall_reads();
    h.start().await.unwrap();
    assert!(eventually(|| h.ledger.list_calls() == 1).await);

    let closed = tokio::time::timeout(Duration::from_secs(2), h.close()).await;
    assert!(matches!(closed, Ok(Ok(()))));
    assert_eq!(h.syncer.cursor(), None);
}

#[tokio::test]
async fn close_lets_an_engine_stop_finish() {
    let h = SyncHarness::new();
    h.factory.slow_close(Duration::from_millis(300));
    h.start().await.unwrap();
    assert!(h.caught_up().await);

    h.register(&WorkflowFixture::new("wf", DON_ID), WorkflowStatus::Active);
    assert!(h.sync().await);
    assert_eq!(h.factory.live(), 1);

    // Close while the engine is still shutting down
    h.ledger.pause(&owner(), "wf");
    h.tick().await;
    assert!(eventually(|| !h.engines.contains("wf")).await);
    h.close().await.unwrap();

    assert_eq!(h.factory.live(), 0);
    assert!(h.engines.close_all().await.is_empty());
}

#[tokio::test]
async fn close_is_not_repeatable() {
    let h = SyncHarness::new();
    h.start().await.unwrap();

    h.close().await.unwrap();
    assert!(h.close().await.is_err());
    assert!(h.syncer.ready().is_err());
    assert!(h.syncer.health_report()[SYNCER_NAME].is_err());
}

#[tokio::test]
async fn start_fails_without_a_registry_reader() {
    let ledger = FakeRegistry::new();
    let don = Arc::new(WatchDonNotifier::new());
    don.notify_don_set(Don::new(DON_ID));

    let (_ticks, source) = TickSource::channel(1);
    let syncer = WorkflowRegistry::new(
        FakeReaderFactory::unavailable(ledger),
        REGISTRY_ADDRESS,
        SyncerConfig::default(),
        RecordingHandler::new(),
        don,
    )
    .with_ticker(source);

    let err = syncer.try_start().await.unwrap_err();
    assert!(matches!(err, SyncerError::ReaderUnavailable(_)));
    assert!(syncer.ready().is_err());

    assert!(syncer.health_report()[SYNCER_NAME].is_err());
    let error = syncer.last_error().unwrap();
    assert!(error.contains(REGISTRY_ADDRESS), "unexpected error: {}", error);

    // A failed start leaves the syncer stopped for good
    assert!(matches!(syncer.close().await, Err(ServiceError::Stopped(_))));
    assert!(syncer.try_start().await.is_err());
}
