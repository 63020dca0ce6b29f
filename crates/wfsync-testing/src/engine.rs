//! Mock engines and engine factory

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wfsync_engine::{
    EngineError, EngineFactory, EngineHandle, EngineRequest, EngineResult, HealthReport, Service,
    ServiceError, ServiceState,
};
use wfsync_types::WorkflowId;

/// An engine that only tracks its lifecycle
pub struct MockEngine {
    name: String,
    workflow_id: WorkflowId,
    state: ServiceState,
    fail_start: bool,
    close_delay: Option<Duration>,
    live: Arc<AtomicUsize>,
}

impl MockEngine {
    pub fn workflow_id(&self) -> WorkflowId {
        self.workflow_id
    }
}

#[async_trait]
impl Service for MockEngine {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn start(&self) -> Result<(), ServiceError> {
        self.state.begin_start(&self.name)?;
        if self.fail_start {
            self.state.finish_start(false);
            return Err(ServiceError::Failed(format!("{} refused to start", self.name)));
        }
        self.state.finish_start(true);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), ServiceError> {
        self.state.begin_stop(&self.name)?;
        if let Some(delay) = self.close_delay {
            tokio::time::sleep(delay).await;
        }
        self.live.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn ready(&self) -> Result<(), ServiceError> {
        self.state.ready(&self.name)
    }

    fn health_report(&self) -> HealthReport {
        HealthReport::from([(self.name.clone(), self.ready().map_err(|e| e.to_string()))])
    }
}

/// Builds [`MockEngine`]s and remembers every request
#[derive(Default)]
pub struct MockEngineFactory {
    requests: Mutex<Vec<EngineRequest>>,
    failing_starts: Mutex<HashSet<String>>,
    failing_creates: Mutex<HashSet<String>>,
    close_delay: Mutex<Option<Duration>>,
    live: Arc<AtomicUsize>,
}

impl MockEngineFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Engines built for `name` fail to start
    pub fn fail_start_for(&self, name: &str) {
        self.failing_starts.lock().insert(name.to_string());
    }

    /// Building an engine for `name` fails
    pub fn fail_create_for(&self, name: &str) {
        self.failing_creates.lock().insert(name.to_string());
    }

    /// Engines built from now on take `delay` to close
    pub fn slow_close(&self, delay: Duration) {
        *self.close_delay.lock() = Some(delay);
    }

    pub fn created(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<EngineRequest> {
        self.requests.lock().clone()
    }

    /// Engines started and not yet closed
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineFactory for MockEngineFactory {
    async fn create(&self, request: EngineRequest) -> EngineResult<EngineHandle> {
        if self.failing_creates.lock().contains(&request.name) {
            return Err(EngineError::Factory {
                name: request.name,
                reason: "injected factory failure".to_string(),
            });
        }

        let engine = MockEngine {
            name: request.name.clone(),
            workflow_id: request.workflow_id,
            state: ServiceState::new(),
            fail_start: self.failing_starts.lock().contains(&request.name),
            close_delay: *self.close_delay.lock(),
            live: self.live.clone(),
        };
        self.requests.lock().push(request);
        Ok(Arc::new(engine))
    }
}
