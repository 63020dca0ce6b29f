//! The workflow registry syncer service
//!
//! [`WorkflowRegistry`] resolves the node's DON, opens a reader on the
//! registry contract and spawns one background task. That task backfills
//! every workflow currently assigned to the DON, then polls the registry's
//! logs on each tick and feeds them to the [`EventHandler`] strictly in
//! chain order. It is the only writer of the poll cursor.

use crate::config::{ApplyFailurePolicy, SyncerConfig};
use crate::decode::decode_log;
use crate::don::DonNotifier;
use crate::error::{DonError, SyncerError, SyncerResult};
use crate::handler::EventHandler;
use crate::reader::{ContractReader, ContractReaderFactory, PageToken, RawLog};
use crate::ticker::{TickSource, Ticker};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use wfsync_engine::{HealthReport, Service, ServiceError, ServiceState};
use wfsync_store::CursorStorage;
use wfsync_types::{ChainPosition, Don, Event};

/// Service name reported by the syncer
pub const SYNCER_NAME: &str = "WorkflowRegistrySyncer";

/// State shared between the service handle and its poll task
struct Shared {
    address: String,
    config: SyncerConfig,
    handler: Arc<dyn EventHandler>,
    last_error: Mutex<Option<String>>,
    cursor: Mutex<Option<ChainPosition>>,
}

impl Shared {
    fn set_last_error(&self, error: Option<String>) {
        *self.last_error.lock() = error;
    }
}

/// Keeps local workflow engines in sync with the on-chain registry
pub struct WorkflowRegistry {
    shared: Arc<Shared>,
    reader_factory: Arc<dyn ContractReaderFactory>,
    don_notifier: Arc<dyn DonNotifier>,
    checkpoints: Option<Arc<dyn CursorStorage>>,
    ticker: Mutex<Option<TickSource>>,
    task: Mutex<Option<JoinHandle<()>>>,
    state: ServiceState,
    cancel: CancellationToken,
}

impl WorkflowRegistry {
    pub fn new(
        reader_factory: Arc<dyn ContractReaderFactory>,
        address: impl Into<String>,
        config: SyncerConfig,
        handler: Arc<dyn EventHandler>,
        don_notifier: Arc<dyn DonNotifier>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                address: address.into(),
                config,
                handler,
                last_error: Mutex::new(None),
                cursor: Mutex::new(None),
            }),
            reader_factory,
            don_notifier,
            checkpoints: None,
            ticker: Mutex::new(None),
            task: Mutex::new(None),
            state: ServiceState::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Drive poll cycles from `ticker` instead of the configured interval
    pub fn with_ticker(mut self, ticker: TickSource) -> Self {
        self.ticker = Mutex::new(Some(ticker));
        self
    }

    /// Persist the cursor so a restart resumes where the last run stopped
    pub fn with_checkpoints(mut self, checkpoints: Arc<dyn CursorStorage>) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    pub fn address(&self) -> &str {
        &self.shared.address
    }

    /// Position of the last applied registry log
    pub fn cursor(&self) -> Option<ChainPosition> {
        *self.shared.cursor.lock()
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.lock().clone()
    }

    /// Start the syncer, returning the typed startup error on failure.
    #[instrument(skip(self), fields(registry = %self.shared.address))]
    pub async fn try_start(&self) -> SyncerResult<()> {
        self.state.begin_start(SYNCER_NAME)?;

        let mut result = self.spawn_poller().await;
        self.state.finish_start(result.is_ok());

        // A close that landed while startup was finishing found nothing to stop
        if result.is_ok()
            && self.cancel.is_cancelled()
            && self.state.begin_stop(SYNCER_NAME).is_ok()
        {
            result = Err(SyncerError::Cancelled);
        }

        if let Err(e) = &result {
            error!(error = %e, "Failed to start workflow registry syncer");
            self.shared.set_last_error(Some(e.to_string()));
        }
        result
    }

    async fn spawn_poller(&self) -> SyncerResult<()> {
        self.shared.config.validate()?;

        let don = self.wait_for_don().await?;
        info!(don_id = %don.id, "Resolved DON membership");

        let reader = self
            .reader_factory
            .open(&self.shared.address)
            .await
            .map_err(SyncerError::ReaderUnavailable)?;

        let cursor = match &self.checkpoints {
            Some(checkpoints) => checkpoints
                .load_cursor(&self.shared.address)
                .await
                .map_err(SyncerError::Checkpoint)?,
            None => None,
        };
        if let Some(position) = cursor {
            info!(cursor = %position, "Resuming from checkpoint");
            *self.shared.cursor.lock() = Some(position);
        }

        let source = self.ticker.lock().take();
        let ticker = source
            .unwrap_or_else(|| TickSource::Interval(self.shared.config.poll_interval()))
            .into_ticker();

        let poller = Poller {
            shared: self.shared.clone(),
            reader,
            checkpoints: self.checkpoints.clone(),
            don,
            cursor,
            backfilled: false,
            cancel: self.cancel.clone(),
        };
        let task = tokio::spawn(poller.run(ticker));
        *self.task.lock() = Some(task);

        info!("Workflow registry syncer started");
        Ok(())
    }

    async fn wait_for_don(&self) -> SyncerResult<Don> {
        let wait = async {
            match self.shared.config.don_wait_timeout() {
                Some(timeout) => tokio::time::timeout(timeout, self.don_notifier.wait_for_don())
                    .await
                    .unwrap_or(Err(DonError::Timeout)),
                None => self.don_notifier.wait_for_don().await,
            }
        };

        tokio::select! {
            _ = self.cancel.cancelled() => Err(SyncerError::DonUnavailable(DonError::Cancelled)),
            result = wait => result.map_err(SyncerError::DonUnavailable),
        }
    }
}

#[async_trait]
impl Service for WorkflowRegistry {
    fn name(&self) -> String {
        SYNCER_NAME.to_string()
    }

    async fn start(&self) -> Result<(), ServiceError> {
        self.try_start().await.map_err(|e| match e {
            SyncerError::Service(e) => e,
            other => ServiceError::Failed(other.to_string()),
        })
    }

    async fn close(&self) -> Result<(), ServiceError> {
        // Cancel first so a start still waiting on the DON gives up
        self.cancel.cancel();
        self.state.begin_stop(SYNCER_NAME)?;

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(registry = %self.shared.address, error = %e, "Syncer task failed");
                return Err(ServiceError::Failed(e.to_string()));
            }
        }

        info!(registry = %self.shared.address, "Workflow registry syncer stopped");
        Ok(())
    }

    fn ready(&self) -> Result<(), ServiceError> {
        self.state.ready(SYNCER_NAME)
    }

    fn health_report(&self) -> HealthReport {
        let mut report = self.shared.handler.health_report();

        let status = match self.ready() {
            Err(e) => Err(e.to_string()),
            Ok(()) => match self.last_error() {
                Some(error) => Err(error),
                None => Ok(()),
            },
        };
        report.insert(SYNCER_NAME.to_string(), status);
        report
    }
}

impl std::fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("address", &self.shared.address)
            .field("config", &self.shared.config)
            .field("cursor", &self.cursor())
            .finish_non_exhaustive()
    }
}

enum ApplyOutcome {
    Applied,
    Failed(String),
    Cancelled,
}

/// The background task: backfill, then poll on every tick
struct Poller {
    shared: Arc<Shared>,
    reader: Arc<dyn ContractReader>,
    checkpoints: Option<Arc<dyn CursorStorage>>,
    don: Don,
    cursor: Option<ChainPosition>,
    backfilled: bool,
    cancel: CancellationToken,
}

impl Poller {
    #[instrument(
        name = "workflow_registry_syncer",
        skip_all,
        fields(registry = %self.shared.address, don_id = %self.don.id)
    )]
    async fn run(mut self, mut ticker: Ticker) {
        self.backfill().await;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if self.backfilled {
                        self.poll().await;
                    } else {
                        self.backfill().await;
                    }
                }
            }
        }

        debug!("Poll loop exited");
    }

    /// Feed a synthesized registration for every workflow of our DON.
    async fn backfill(&mut self) {
        let limit = self.shared.config.query_count;
        let mut page = PageToken::first(limit);
        let mut head = None;
        let mut applied = 0usize;
        let mut failure = None;

        loop {
            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                read = self.reader.list_workflows(self.don.id, page) => read,
            };
            let listing = match read {
                Ok(listing) => listing,
                Err(e) => {
                    warn!(offset = page.offset, error = %e, "Backfill read failed, retrying next tick");
                    self.shared.set_last_error(Some(e.to_string()));
                    return;
                }
            };
            let position = *head.get_or_insert(listing.head);
            let count = listing.records.len() as u64;

            for record in &listing.records {
                if record.don_id != self.don.id {
                    continue;
                }
                match self.apply(Event::registered_from(record, position)).await {
                    ApplyOutcome::Applied => applied += 1,
                    ApplyOutcome::Failed(e) => {
                        failure.get_or_insert(e);
                    }
                    ApplyOutcome::Cancelled => return,
                }
            }

            match listing.next {
                Some(next) if count >= limit => page = next,
                _ => break,
            }
        }

        self.backfilled = true;
        self.shared.set_last_error(failure);
        if self.cursor.is_none() {
            self.commit(head.unwrap_or(ChainPosition::ZERO)).await;
        }
        info!(workflows = applied, cursor = ?self.cursor, "Backfill complete");
    }

    /// Drain new logs after the cursor and apply them in order.
    async fn poll(&mut self) {
        let start = self.cursor.unwrap_or(ChainPosition::ZERO);
        let limit = self.shared.config.query_count;

        let mut logs: Vec<RawLog> = Vec::new();
        let mut from = start;
        for _ in 0..self.shared.config.max_pages_per_tick {
            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                read = self.reader.events_since(from, limit) => read,
            };
            let page = match read {
                Ok(page) => page,
                Err(e) => {
                    warn!(cursor = %start, error = %e, "Failed to read registry logs, retrying next tick");
                    self.shared.set_last_error(Some(e.to_string()));
                    return;
                }
            };

            let count = page.len() as u64;
            if let Some(last) = page.iter().map(|log| log.position).max() {
                from = last;
            }
            logs.extend(page);
            if count < limit {
                break;
            }
        }

        if logs.is_empty() {
            self.shared.set_last_error(None);
            return;
        }
        logs.sort_by_key(|log| log.position);
        debug!(logs = logs.len(), cursor = %start, "Applying registry logs");

        let mut last_applied = None;
        let mut failure = None;
        for log in logs {
            let position = log.position;

            let event = match decode_log(&log) {
                Ok(event) => event,
                Err(e) => {
                    error!(position = %position, error = %e, "Skipping undecodable registry log");
                    failure = Some(e.to_string());
                    last_applied = Some(position);
                    continue;
                }
            };

            if event.don_id().is_some_and(|don_id| don_id != self.don.id) {
                debug!(position = %position, event_type = %event.event_type(), "Skipping event for another DON");
                last_applied = Some(position);
                continue;
            }

            match self.apply(event).await {
                ApplyOutcome::Applied => last_applied = Some(position),
                ApplyOutcome::Failed(e) => {
                    failure = Some(e);
                    match self.shared.config.apply_failure_policy {
                        ApplyFailurePolicy::Continue => last_applied = Some(position),
                        ApplyFailurePolicy::HaltCycle => break,
                    }
                }
                ApplyOutcome::Cancelled => {
                    if let Some(position) = last_applied {
                        self.commit(position).await;
                    }
                    return;
                }
            }
        }

        // Publish health before the cursor so observers of the cursor see both
        self.shared.set_last_error(failure);
        if let Some(position) = last_applied {
            self.commit(position).await;
        }
    }

    /// Hand one event to the handler unless shutdown has begun.
    ///
    /// A `handle` already in flight always runs to completion.
    async fn apply(&self, event: Event) -> ApplyOutcome {
        if self.cancel.is_cancelled() {
            return ApplyOutcome::Cancelled;
        }

        let position = event.position;
        let event_type = event.event_type();
        let workflow = event.workflow_name().to_string();

        match self.shared.handler.handle(event).await {
            Ok(()) => ApplyOutcome::Applied,
            Err(e) => {
                error!(
                    position = %position,
                    event_type = %event_type,
                    workflow = %workflow,
                    error = %e,
                    "Failed to apply registry event"
                );
                ApplyOutcome::Failed(e.to_string())
            }
        }
    }

    async fn commit(&mut self, position: ChainPosition) {
        if self.cursor.is_some_and(|cursor| cursor >= position) {
            return;
        }
        self.cursor = Some(position);
        *self.shared.cursor.lock() = Some(position);

        if let Some(checkpoints) = &self.checkpoints {
            if let Err(e) = checkpoints.save_cursor(&self.shared.address, position).await {
                warn!(cursor = %position, error = %e, "Failed to checkpoint cursor");
            }
        }
    }
}
