//! End-to-end test: engine lifecycle driven by registry events.

use std::sync::Arc;
use wfsync::{ApplyFailurePolicy, EventHandler, SyncNotification, SyncerConfig, SYNCER_NAME};
use wfsync_engine::Service;
use wfsync_testing::{owner, RecordingHandler, SyncHarness, WorkflowFixture, DON_ID};
use wfsync_types::{ChainPosition, Event, WorkflowStatus};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pause_and_activate_toggle_the_engine() {
    let h = SyncHarness::new();
    h.start().await.unwrap();
    assert!(h.caught_up().await);

    let workflow = WorkflowFixture::new("wf", DON_ID);
    h.register(&workflow, WorkflowStatus::Active);
    assert!(h.sync().await);
    assert!(h.engines.contains("wf"));

    h.ledger.pause(&owner(), "wf");
    assert!(h.sync().await);
    assert!(!h.engines.contains("wf"));
    assert_eq!(h.spec("wf").await.unwrap().status, WorkflowStatus::Paused);

    h.ledger.activate(&owner(), "wf");
    assert!(h.sync().await);
    assert!(h.engines.get("wf").unwrap().ready().is_ok());
    assert_eq!(h.spec("wf").await.unwrap().status, WorkflowStatus::Active);

    assert_eq!(h.factory.created(), 2);
    assert_eq!(h.factory.live(), 1);

    h.close().await.unwrap();
}

#[tokio::test]
async fn update_swaps_in_a_single_fresh_engine() {
    let h = SyncHarness::new();
    h.start().await.unwrap();
    assert!(h.caught_up().await);

    let workflow = WorkflowFixture::new("wf", DON_ID);
    h.register(&workflow, WorkflowStatus::Active);
    assert!(h.sync().await);

    let next = h.update(&workflow);
    assert!(h.sync().await);

    let spec = h.spec("wf").await.unwrap();
    assert_eq!(spec.workflow_id, next.workflow_id());
    assert_eq!(spec.binary_url, next.binary_url());
    assert_eq!(spec.status, WorkflowStatus::Active);

    assert_eq!(h.engines.len(), 1);
    assert_eq!(h.factory.live(), 1);
    let requests = h.factory.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].workflow_id, next.workflow_id());
    assert_eq!(requests[1].binary, next.binary());

    h.close().await.unwrap();
}

#[tokio::test]
async fn redelivered_registration_is_a_noop() {
    let h = SyncHarness::new();
    let workflow = WorkflowFixture::new("wf", DON_ID);
    let record = workflow.record(WorkflowStatus::Active);
    h.fetcher.publish(&workflow);

    let event = Event::registered_from(&record, ChainPosition::new(1, 0));
    h.workflows.handle(event.clone()).await.unwrap();
    let fetches = h.fetcher.total_calls();

    h.workflows.handle(event.clone()).await.unwrap();
    h.workflows.handle(event).await.unwrap();

    assert_eq!(h.factory.created(), 1);
    assert_eq!(h.factory.live(), 1);
    assert_eq!(h.fetcher.total_calls(), fetches);
    assert_eq!(h.store.spec_count().await, 1);
}

#[tokio::test]
async fn failed_engine_start_keeps_spec_and_moves_on() {
    let h = SyncHarness::new();
    let mut notifications = h.workflows.subscribe();
    h.start().await.unwrap();
    assert!(h.caught_up().await);

    h.factory.fail_start_for("broken");
    h.register(&WorkflowFixture::new("broken", DON_ID), WorkflowStatus::Active);
    h.register(&WorkflowFixture::new("healthy", DON_ID), WorkflowStatus::Active);
    assert!(h.sync().await);

    assert_eq!(h.spec("broken").await.unwrap().status, WorkflowStatus::Active);
    assert!(!h.engines.contains("broken"));
    assert!(h.engines.contains("healthy"));

    let error = h.syncer.last_error().unwrap();
    assert!(error.contains("broken"), "unexpected error: {}", error);
    assert!(h.syncer.health_report()[SYNCER_NAME].is_err());
    assert!(h.syncer.health_report()["healthy"].is_ok());

    let mut saw_failure = false;
    while let Ok(notification) = notifications.try_recv() {
        if let SyncNotification::ApplyFailed { name, .. } = notification {
            assert_eq!(name, "broken");
            saw_failure = true;
        }
    }
    assert!(saw_failure);

    h.close().await.unwrap();
}

#[tokio::test]
async fn factory_failure_is_reported() {
    let h = SyncHarness::new();
    h.start().await.unwrap();
    assert!(h.caught_up().await);

    h.factory.fail_create_for("unbuildable");
    h.register(&WorkflowFixture::new("unbuildable", DON_ID), WorkflowStatus::Active);
    assert!(h.sync().await);

    assert!(h.spec("unbuildable").await.is_some());
    assert!(h.engines.is_empty());
    let error = h.syncer.last_error().unwrap();
    assert!(error.contains("injected factory failure"), "unexpected error: {}", error);

    // The next successful cycle clears the error
    h.register(&WorkflowFixture::new("fine", DON_ID), WorkflowStatus::Paused);
    assert!(h.sync().await);
    assert!(h.syncer.last_error().is_none());

    h.close().await.unwrap();
}

#[tokio::test]
async fn halt_cycle_redelivers_the_failed_event() {
    let recorder = RecordingHandler::new();
    let h = SyncHarness::builder()
        .config(SyncerConfig::default().with_apply_failure_policy(ApplyFailurePolicy::HaltCycle))
        .handler(recorder.clone() as Arc<dyn EventHandler>)
        .build();
    h.start().await.unwrap();
    assert!(h.caught_up().await);

    let first = h.register(&WorkflowFixture::new("a", DON_ID), WorkflowStatus::Paused);
    let failing = h.register(&WorkflowFixture::new("b", DON_ID), WorkflowStatus::Paused);
    h.register(&WorkflowFixture::new("c", DON_ID), WorkflowStatus::Paused);
    recorder.fail_at(failing);

    h.tick().await;
    assert!(
        wfsync_testing::eventually(|| {
            h.syncer.last_error().is_some() && h.syncer.cursor() == Some(first)
        })
        .await
    );
    assert_eq!(recorder.positions(), vec![first, failing]);

    recorder.clear_failures();
    assert!(h.sync().await);
    assert_eq!(
        recorder.positions()[2..].to_vec(),
        vec![failing, h.ledger.head()]
    );
    assert!(h.syncer.last_error().is_none());

    h.close().await.unwrap();
}

#[tokio::test]
async fn events_for_other_dons_are_ignored() {
    let h = SyncHarness::new();
    h.start().await.unwrap();
    assert!(h.caught_up().await);

    h.register(&WorkflowFixture::new("theirs", DON_ID + 1), WorkflowStatus::Active);
    assert!(h.sync().await);

    assert!(h.spec("theirs").await.is_none());
    assert_eq!(h.factory.created(), 0);

    h.close().await.unwrap();
}
