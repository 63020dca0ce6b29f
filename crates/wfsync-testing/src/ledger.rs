//! In-memory registry contract

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use wfsync::decode::encode_event;
use wfsync::{
    ContractReader, ContractReaderFactory, PageToken, RawLog, ReaderError, ReaderResult,
    WorkflowPage,
};
use wfsync_types::{
    ActivatedPayload, ChainPosition, DeletedPayload, DonId, Event, EventPayload,
    ForceUpdateSecretsPayload, Owner, PausedPayload, UpdatedPayload, WorkflowRecord,
    WorkflowStatus,
};

#[derive(Default)]
struct LedgerState {
    /// Registered workflows in registration order
    workflows: Vec<WorkflowRecord>,
    /// Logs in ascending position order
    logs: Vec<RawLog>,
    head: ChainPosition,
    failing_reads: usize,
    stalled: bool,
    list_calls: usize,
    event_calls: usize,
}

impl LedgerState {
    fn mine(&mut self) -> ChainPosition {
        self.head = ChainPosition::new(self.head.block + 1, 0);
        self.head
    }

    fn emit(&mut self, payload: EventPayload) -> ChainPosition {
        let position = self.mine();
        self.logs.push(encode_event(&Event::new(position, payload)));
        position
    }

    fn take_failure(&mut self) -> ReaderResult<()> {
        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            return Err(ReaderError::Read("injected read failure".to_string()));
        }
        Ok(())
    }

    fn find(&mut self, owner: &Owner, name: &str) -> &mut WorkflowRecord {
        self.workflows
            .iter_mut()
            .find(|w| &w.owner == owner && w.name == name)
            .unwrap_or_else(|| panic!("workflow {} not registered", name))
    }
}

/// A workflow registry contract held in memory.
///
/// Every mutation mines a new block holding exactly one log, so the head
/// position always names the latest log.
#[derive(Default)]
pub struct FakeRegistry {
    state: Mutex<LedgerState>,
}

impl FakeRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Factory that hands out this registry for any address
    pub fn factory(self: &Arc<Self>) -> Arc<FakeReaderFactory> {
        Arc::new(FakeReaderFactory {
            registry: self.clone(),
            fail_open: false,
        })
    }

    pub fn head(&self) -> ChainPosition {
        self.state.lock().head
    }

    pub fn workflow_count(&self) -> usize {
        self.state.lock().workflows.len()
    }

    /// The next `count` reads fail
    pub fn fail_next_reads(&self, count: usize) {
        self.state.lock().failing_reads = count;
    }

    /// Reads from now on never complete
    pub fn stall_reads(&self) {
        self.state.lock().stalled = true;
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }

    pub fn event_calls(&self) -> usize {
        self.state.lock().event_calls
    }

    pub fn register(&self, record: WorkflowRecord) -> ChainPosition {
        let mut state = self.state.lock();
        state
            .workflows
            .retain(|w| !(w.owner == record.owner && w.name == record.name));
        let payload = EventPayload::Registered((&record).into());
        state.workflows.push(record);
        state.emit(payload)
    }

    pub fn activate(&self, owner: &Owner, name: &str) -> ChainPosition {
        let mut state = self.state.lock();
        let record = state.find(owner, name);
        record.status = WorkflowStatus::Active;
        let payload = ActivatedPayload {
            workflow_id: record.id,
            owner: record.owner,
            don_id: record.don_id,
            name: record.name.clone(),
        };
        state.emit(EventPayload::Activated(payload))
    }

    pub fn pause(&self, owner: &Owner, name: &str) -> ChainPosition {
        let mut state = self.state.lock();
        let record = state.find(owner, name);
        record.status = WorkflowStatus::Paused;
        let payload = PausedPayload {
            workflow_id: record.id,
            owner: record.owner,
            don_id: record.don_id,
            name: record.name.clone(),
        };
        state.emit(EventPayload::Paused(payload))
    }

    /// Point the workflow at new artifacts, keeping its status
    pub fn update(&self, next: &WorkflowRecord) -> ChainPosition {
        let mut state = self.state.lock();
        let record = state.find(&next.owner, &next.name);
        let payload = UpdatedPayload {
            old_workflow_id: record.id,
            new_workflow_id: next.id,
            owner: next.owner,
            don_id: next.don_id,
            name: next.name.clone(),
            binary_url: next.binary_url.clone(),
            config_url: next.config_url.clone(),
            secrets_url: next.secrets_url.clone(),
        };
        record.id = next.id;
        record.binary_url = next.binary_url.clone();
        record.config_url = next.config_url.clone();
        record.secrets_url = next.secrets_url.clone();
        state.emit(EventPayload::Updated(payload))
    }

    pub fn delete(&self, owner: &Owner, name: &str) -> ChainPosition {
        let mut state = self.state.lock();
        let record = state.find(owner, name).clone();
        state
            .workflows
            .retain(|w| !(&w.owner == owner && w.name == name));
        state.emit(EventPayload::Deleted(DeletedPayload {
            workflow_id: record.id,
            owner: record.owner,
            don_id: record.don_id,
            name: record.name,
        }))
    }

    pub fn force_update_secrets(&self, owner: &Owner, name: &str, url: &str) -> ChainPosition {
        let mut state = self.state.lock();
        state.emit(EventPayload::ForceUpdateSecrets(ForceUpdateSecretsPayload {
            owner: *owner,
            name: name.to_string(),
            secrets_url: url.to_string(),
        }))
    }

    /// Append an arbitrary log in a new block
    pub fn push_log(&self, event_type: &str, data: serde_json::Value) -> ChainPosition {
        let mut state = self.state.lock();
        let position = state.mine();
        state.logs.push(RawLog {
            position,
            event_type: event_type.to_string(),
            data,
        });
        position
    }

    /// Insert a pre-positioned log, keeping the log ordered
    pub fn insert_log(&self, log: RawLog) {
        let mut state = self.state.lock();
        let at = state.logs.partition_point(|l| l.position <= log.position);
        if log.position > state.head {
            state.head = log.position;
        }
        state.logs.insert(at, log);
    }
}

#[async_trait]
impl ContractReader for FakeRegistry {
    async fn list_workflows(&self, don_id: DonId, page: PageToken) -> ReaderResult<WorkflowPage> {
        let stalled = {
            let mut state = self.state.lock();
            state.list_calls += 1;
            state.stalled
        };
        if stalled {
            return std::future::pending().await;
        }

        let mut state = self.state.lock();
        state.take_failure()?;

        let assigned: Vec<&WorkflowRecord> = state
            .workflows
            .iter()
            .filter(|w| w.don_id == don_id)
            .collect();
        let records: Vec<WorkflowRecord> = assigned
            .iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .map(|w| (*w).clone())
            .collect();

        let consumed = page.offset + records.len() as u64;
        let next = (consumed < assigned.len() as u64).then_some(PageToken {
            offset: consumed,
            limit: page.limit,
        });

        Ok(WorkflowPage {
            records,
            next,
            head: state.head,
        })
    }

    async fn events_since(&self, after: ChainPosition, limit: u64) -> ReaderResult<Vec<RawLog>> {
        let stalled = {
            let mut state = self.state.lock();
            state.event_calls += 1;
            state.stalled
        };
        if stalled {
            return std::future::pending().await;
        }

        let mut state = self.state.lock();
        state.take_failure()?;

        Ok(state
            .logs
            .iter()
            .filter(|log| log.position > after)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

/// [`ContractReaderFactory`] over a [`FakeRegistry`]
pub struct FakeReaderFactory {
    registry: Arc<FakeRegistry>,
    fail_open: bool,
}

impl FakeReaderFactory {
    /// A factory whose `open` always fails
    pub fn unavailable(registry: Arc<FakeRegistry>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            fail_open: true,
        })
    }
}

#[async_trait]
impl ContractReaderFactory for FakeReaderFactory {
    async fn open(&self, address: &str) -> ReaderResult<Arc<dyn ContractReader>> {
        if self.fail_open {
            return Err(ReaderError::Unavailable(format!(
                "no registry deployed at {}",
                address
            )));
        }
        Ok(self.registry.clone())
    }
}
