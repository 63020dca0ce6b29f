//! A fully wired syncer over in-memory fakes

use crate::engine::MockEngineFactory;
use crate::fetcher::StaticFetcher;
use crate::fixtures::{owner, WorkflowFixture};
use crate::ledger::FakeRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use wfsync::{
    EventHandler, HandlerConfig, SyncerConfig, TickSource, WatchDonNotifier, WorkflowEventHandler,
    WorkflowRegistry,
};
use wfsync_engine::{EngineRegistry, Service, ServiceError};
use wfsync_store::{InMemoryStore, SpecStorage};
use wfsync_types::{ChainPosition, Don, DonId, WorkflowSpec, WorkflowStatus};

pub const REGISTRY_ADDRESS: &str = "0x000000000000000000000000000000000000beef";

/// DON the harness node belongs to
pub const DON_ID: u32 = 1;

/// Poll `condition` until it holds or five seconds pass
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Route syncer logs to the test output; `RUST_LOG` selects the level
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Builder for [`SyncHarness`]
#[derive(Default)]
pub struct HarnessBuilder {
    config: Option<SyncerConfig>,
    ledger: Option<Arc<FakeRegistry>>,
    store: Option<Arc<InMemoryStore>>,
    fetcher: Option<Arc<StaticFetcher>>,
    handler: Option<Arc<dyn EventHandler>>,
    checkpoints: bool,
}

impl HarnessBuilder {
    pub fn config(mut self, config: SyncerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sync against an existing ledger
    pub fn ledger(mut self, ledger: Arc<FakeRegistry>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Persist into an existing store, as a restarted node would
    pub fn store(mut self, store: Arc<InMemoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<StaticFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Feed events to `handler` instead of the production handler
    pub fn handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Checkpoint the cursor into the store
    pub fn checkpoints(mut self) -> Self {
        self.checkpoints = true;
        self
    }

    pub fn build(self) -> SyncHarness {
        let ledger = self.ledger.unwrap_or_else(FakeRegistry::new);
        let store = self.store.unwrap_or_else(|| Arc::new(InMemoryStore::new()));
        let fetcher = self.fetcher.unwrap_or_else(StaticFetcher::new);
        let factory = MockEngineFactory::new();
        let engines = Arc::new(EngineRegistry::new());

        let workflows = Arc::new(
            WorkflowEventHandler::new(store.clone(), fetcher.clone(), factory.clone())
                .with_config(HandlerConfig::default())
                .with_engine_registry(engines.clone()),
        );
        let handler = self
            .handler
            .unwrap_or_else(|| workflows.clone() as Arc<dyn EventHandler>);

        let don = Arc::new(WatchDonNotifier::new());
        let (ticks, source) = TickSource::channel(64);

        let mut syncer = WorkflowRegistry::new(
            ledger.factory(),
            REGISTRY_ADDRESS,
            self.config.unwrap_or_default(),
            handler,
            don.clone(),
        )
        .with_ticker(source);
        if self.checkpoints {
            syncer = syncer.with_checkpoints(store.clone());
        }

        SyncHarness {
            ledger,
            store,
            fetcher,
            factory,
            workflows,
            engines,
            don,
            syncer,
            ticks,
        }
    }
}

/// Syncer, handler and every collaborator, driven by manual ticks
pub struct SyncHarness {
    pub ledger: Arc<FakeRegistry>,
    pub store: Arc<InMemoryStore>,
    pub fetcher: Arc<StaticFetcher>,
    pub factory: Arc<MockEngineFactory>,
    pub workflows: Arc<WorkflowEventHandler>,
    pub engines: Arc<EngineRegistry>,
    pub don: Arc<WatchDonNotifier>,
    pub syncer: WorkflowRegistry,
    ticks: mpsc::Sender<()>,
}

impl SyncHarness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Publish the workflow's artifacts and register it on the ledger
    pub fn register(&self, workflow: &WorkflowFixture, status: WorkflowStatus) -> ChainPosition {
        self.fetcher.publish(workflow);
        self.ledger.register(workflow.record(status))
    }

    /// Publish the next version's artifacts and record the update on the ledger
    pub fn update(&self, workflow: &WorkflowFixture) -> WorkflowFixture {
        let next = workflow.next_version();
        self.fetcher.publish(&next);
        self.ledger.update(&next.record(WorkflowStatus::Active));
        next
    }

    /// Announce DON membership and start the syncer
    pub async fn start(&self) -> Result<(), ServiceError> {
        self.don.notify_don_set(Don::new(DonId::new(DON_ID)));
        self.syncer.start().await
    }

    /// Wait until the syncer's cursor reaches the ledger head
    pub async fn caught_up(&self) -> bool {
        let head = self.ledger.head();
        eventually(|| self.syncer.cursor() == Some(head)).await
    }

    /// Run one poll cycle and wait for it to reach the ledger head
    pub async fn sync(&self) -> bool {
        self.tick().await;
        self.caught_up().await
    }

    pub async fn tick(&self) {
        // The poll task owns the receiver until close
        let _ = self.ticks.send(()).await;
    }

    pub async fn spec(&self, name: &str) -> Option<WorkflowSpec> {
        self.store.get_spec(&owner(), name).await.ok().flatten()
    }

    pub async fn close(&self) -> Result<(), ServiceError> {
        self.syncer.close().await
    }
}

impl Default for SyncHarness {
    fn default() -> Self {
        Self::new()
    }
}
