//! Engine construction

use crate::error::EngineResult;
use crate::registry::EngineHandle;
use async_trait::async_trait;
use wfsync_types::{Owner, WorkflowId};

/// Everything needed to build an engine for one workflow version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRequest {
    pub workflow_id: WorkflowId,
    pub owner: Owner,
    pub name: String,
    pub config: Vec<u8>,
    pub binary: Vec<u8>,
}

/// Builds engines. The returned handle is not started yet.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn create(&self, request: EngineRequest) -> EngineResult<EngineHandle>;
}
