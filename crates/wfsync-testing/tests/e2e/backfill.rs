//! End-to-end test: initial backfill of the registry listing.

use std::sync::Arc;
use wfsync::{EventHandler, SyncerConfig, SYNCER_NAME};
use wfsync_engine::Service;
use wfsync_testing::{eventually, RecordingHandler, SyncHarness, WorkflowFixture, DON_ID};
use wfsync_types::{EventPayload, EventType, WorkflowStatus};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn backfill_delivers_every_workflow_across_pages() {
    let recorder = RecordingHandler::new();
    let h = SyncHarness::builder()
        .config(SyncerConfig::default().with_query_count(20))
        .handler(recorder.clone() as Arc<dyn EventHandler>)
        .build();

    for i in 0..250 {
        let workflow = WorkflowFixture::new(format!("workflow-{}", i), DON_ID);
        h.register(&workflow, WorkflowStatus::Active);
    }

    h.start().await.unwrap();
    assert!(h.caught_up().await);

    let events = recorder.events();
    assert_eq!(events.len(), 250);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.event_type(), EventType::WorkflowRegistered);
        assert_eq!(event.workflow_name(), format!("workflow-{}", i));
    }
    // 12 full pages and one short page
    assert_eq!(h.ledger.list_calls(), 13);

    h.close().await.unwrap();
}

#[tokio::test]
async fn backfill_skips_other_dons() {
    let recorder = RecordingHandler::new();
    let h = SyncHarness::builder()
        .handler(recorder.clone() as Arc<dyn EventHandler>)
        .build();

    h.register(&WorkflowFixture::new("ours", DON_ID), WorkflowStatus::Active);
    h.register(
        &WorkflowFixture::new("theirs", DON_ID + 1),
        WorkflowStatus::Active,
    );

    h.start().await.unwrap();
    assert!(h.caught_up().await);

    let names: Vec<String> = recorder
        .events()
        .iter()
        .map(|e| e.workflow_name().to_string())
        .collect();
    assert_eq!(names, vec!["ours".to_string()]);

    h.close().await.unwrap();
}

#[tokio::test]
async fn initially_paused_workflow_is_persisted_without_engine() {
    let h = SyncHarness::new();
    let workflow = WorkflowFixture::new("paused", DON_ID);
    h.register(&workflow, WorkflowStatus::Paused);

    h.start().await.unwrap();
    assert!(h.caught_up().await);

    let spec = h.spec("paused").await.unwrap();
    assert_eq!(spec.status, WorkflowStatus::Paused);
    assert_eq!(spec.workflow_id, workflow.workflow_id());
    assert!(matches!(h.engines.get("paused"), Err(e) if e.is_not_found()));
    assert_eq!(h.factory.created(), 0);

    h.close().await.unwrap();
}

#[tokio::test]
async fn initially_active_workflow_gets_an_engine() {
    let h = SyncHarness::new();
    let workflow = WorkflowFixture::new("active", DON_ID);
    h.register(&workflow, WorkflowStatus::Active);

    h.start().await.unwrap();
    assert!(h.caught_up().await);

    let spec = h.spec("active").await.unwrap();
    assert_eq!(spec.status, WorkflowStatus::Active);
    assert!(spec.secrets_id.is_some());

    let engine = h.engines.get("active").unwrap();
    assert!(engine.ready().is_ok());
    let request = &h.factory.requests()[0];
    assert_eq!(request.workflow_id, workflow.workflow_id());
    assert_eq!(request.binary, workflow.binary());
    assert_eq!(request.config, workflow.config());

    h.close().await.unwrap();
}

#[tokio::test]
async fn backfill_read_failure_is_retried_on_next_tick() {
    let recorder = RecordingHandler::new();
    let h = SyncHarness::builder()
        .handler(recorder.clone() as Arc<dyn EventHandler>)
        .build();
    h.register(&WorkflowFixture::new("wf", DON_ID), WorkflowStatus::Active);
    h.ledger.fail_next_reads(1);

    h.start().await.unwrap();
    assert!(eventually(|| h.syncer.last_error().is_some()).await);
    assert!(recorder.is_empty());
    assert!(h.syncer.cursor().is_none());
    assert!(h.syncer.health_report()[SYNCER_NAME].is_err());

    assert!(h.sync().await);
    assert_eq!(recorder.len(), 1);
    assert!(h.syncer.last_error().is_none());
    assert!(h.syncer.health_report()[SYNCER_NAME].is_ok());

    h.close().await.unwrap();
}

#[tokio::test]
async fn backfill_events_carry_listing_data() {
    let recorder = RecordingHandler::new();
    let h = SyncHarness::builder()
        .handler(recorder.clone() as Arc<dyn EventHandler>)
        .build();
    let workflow = WorkflowFixture::new("wf", DON_ID);
    h.register(&workflow, WorkflowStatus::Paused);

    h.start().await.unwrap();
    assert!(h.caught_up().await);

    let events = recorder.events();
    let EventPayload::Registered(payload) = &events[0].payload else {
        panic!("expected a registration");
    };
    assert_eq!(payload.workflow_id, workflow.workflow_id());
    assert_eq!(payload.status, WorkflowStatus::Paused);
    assert_eq!(payload.secrets_url, workflow.secrets_url());
    assert_eq!(events[0].position, h.ledger.head());

    h.close().await.unwrap();
}
