//! Recording event handler

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use wfsync::{EventHandler, HandlerError, HandlerResult};
use wfsync_types::{ChainPosition, Event};

/// Records every event it is handed, in order.
///
/// Events at positions registered with [`fail_at`](Self::fail_at) are
/// recorded and then rejected.
#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<Event>>,
    failing: Mutex<HashSet<ChainPosition>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_at(&self, position: ChainPosition) {
        self.failing.lock().insert(position);
    }

    pub fn clear_failures(&self) {
        self.failing.lock().clear();
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn positions(&self) -> Vec<ChainPosition> {
        self.events.lock().iter().map(|e| e.position).collect()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: Event) -> HandlerResult<()> {
        let position = event.position;
        let name = event.workflow_name().to_string();
        self.events.lock().push(event);

        if self.failing.lock().contains(&position) {
            return Err(HandlerError::SpecNotFound {
                owner: crate::fixtures::owner(),
                name,
            });
        }
        Ok(())
    }
}
