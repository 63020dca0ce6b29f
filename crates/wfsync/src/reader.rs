//! Read access to the on-chain workflow registry

use crate::error::ReaderResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use wfsync_types::{ChainPosition, DonId, WorkflowRecord};

/// Offset pagination over the registry's workflow listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageToken {
    pub offset: u64,
    pub limit: u64,
}

impl PageToken {
    pub fn first(limit: u64) -> Self {
        Self { offset: 0, limit }
    }
}

/// One page of the workflow listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowPage {
    pub records: Vec<WorkflowRecord>,
    /// Token for the following page, `None` when this page is the last
    pub next: Option<PageToken>,
    /// Chain head the listing was read at
    pub head: ChainPosition,
}

/// An undecoded registry log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLog {
    pub position: ChainPosition,
    pub event_type: String,
    pub data: serde_json::Value,
}

/// Reads registry state and logs
#[async_trait]
pub trait ContractReader: Send + Sync {
    /// List workflows assigned to `don_id`
    async fn list_workflows(&self, don_id: DonId, page: PageToken) -> ReaderResult<WorkflowPage>;

    /// Logs strictly after `after`, in ascending position order, at most `limit` of them
    async fn events_since(&self, after: ChainPosition, limit: u64) -> ReaderResult<Vec<RawLog>>;
}

/// Opens readers bound to a registry address
#[async_trait]
pub trait ContractReaderFactory: Send + Sync {
    async fn open(&self, address: &str) -> ReaderResult<Arc<dyn ContractReader>>;
}
