//! End-to-end test: secrets caching and forced refresh.

use wfsync_store::SecretsStorage;
use wfsync_testing::{owner, SyncHarness, WorkflowFixture, DON_ID};
use wfsync_types::WorkflowStatus;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn force_update_refreshes_cached_secrets_in_place() {
    let h = SyncHarness::new();
    h.start().await.unwrap();
    assert!(h.caught_up().await);

    let workflow = WorkflowFixture::new("wf", DON_ID);
    h.register(&workflow, WorkflowStatus::Active);
    assert!(h.sync().await);

    let url = workflow.secrets_url();
    let before = h.store.get_secrets(&url).await.unwrap().unwrap();
    assert_eq!(before.contents, "contents");

    h.fetcher.set(&url, "updated contents");
    h.ledger.force_update_secrets(&owner(), "wf", &url);
    assert!(h.sync().await);

    let after = h.store.get_secrets(&url).await.unwrap().unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.contents, "updated contents");
    assert_ne!(after.content_hash, before.content_hash);
    assert_eq!(h.store.get_contents(&url).await.unwrap(), "updated contents");
    assert_eq!(h.spec("wf").await.unwrap().secrets_id, Some(before.id));

    h.close().await.unwrap();
}

#[tokio::test]
async fn force_update_with_unchanged_contents_keeps_the_row() {
    let h = SyncHarness::new();
    h.start().await.unwrap();
    assert!(h.caught_up().await);

    let workflow = WorkflowFixture::new("wf", DON_ID);
    h.register(&workflow, WorkflowStatus::Paused);
    assert!(h.sync().await);

    let url = workflow.secrets_url();
    let before = h.store.get_secrets(&url).await.unwrap().unwrap();

    h.ledger.force_update_secrets(&owner(), "wf", &url);
    assert!(h.sync().await);

    let after = h.store.get_secrets(&url).await.unwrap().unwrap();
    assert_eq!(after.updated_at, before.updated_at);
    // Forced refresh always goes back to the source
    assert_eq!(h.fetcher.calls(&url), 2);
    assert!(h.syncer.last_error().is_none());

    h.close().await.unwrap();
}

#[tokio::test]
async fn secrets_are_fetched_once_across_lifecycle_events() {
    let h = SyncHarness::new();
    h.start().await.unwrap();
    assert!(h.caught_up().await);

    let workflow = WorkflowFixture::new("wf", DON_ID);
    h.register(&workflow, WorkflowStatus::Active);
    h.ledger.pause(&owner(), "wf");
    h.ledger.activate(&owner(), "wf");
    assert!(h.sync().await);

    assert_eq!(h.fetcher.calls(&workflow.secrets_url()), 1);
    assert_eq!(h.fetcher.calls(&workflow.binary_url()), 2);
    assert!(h.engines.contains("wf"));

    h.close().await.unwrap();
}

#[tokio::test]
async fn workflow_without_secrets_links_nothing() {
    let h = SyncHarness::new();
    h.start().await.unwrap();
    assert!(h.caught_up().await);

    let workflow = WorkflowFixture::new("plain", DON_ID).without_secrets();
    h.register(&workflow, WorkflowStatus::Active);
    assert!(h.sync().await);

    let spec = h.spec("plain").await.unwrap();
    assert!(spec.secrets_id.is_none());
    assert!(h.engines.contains("plain"));
    assert_eq!(h.factory.requests()[0].workflow_id, workflow.workflow_id());

    h.close().await.unwrap();
}
