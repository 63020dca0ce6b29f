//! Storage trait definitions

use crate::error::StorageResult;
use async_trait::async_trait;
use wfsync_types::{ChainPosition, Owner, SecretsId, SecretsRecord, WorkflowSpec};

/// Combined storage trait
pub trait WorkflowStore: SpecStorage + SecretsStorage + CursorStorage + Send + Sync {}

impl<T> WorkflowStore for T where T: SpecStorage + SecretsStorage + CursorStorage + Send + Sync {}

/// Storage for workflow specs
#[async_trait]
pub trait SpecStorage: Send + Sync {
    /// Get the spec for `(owner, name)`
    async fn get_spec(&self, owner: &Owner, name: &str) -> StorageResult<Option<WorkflowSpec>>;

    /// List all specs
    async fn list_specs(&self) -> StorageResult<Vec<WorkflowSpec>>;

    /// Create or replace the spec for the spec's `(owner, name)`
    async fn upsert_spec(&self, spec: WorkflowSpec) -> StorageResult<()>;

    /// Delete the spec for `(owner, name)`, returning whether it existed
    async fn delete_spec(&self, owner: &Owner, name: &str) -> StorageResult<bool>;
}

/// Storage for cached secrets
#[async_trait]
pub trait SecretsStorage: Send + Sync {
    /// Store contents for `url`.
    ///
    /// Creates the row when the URL is unknown. Otherwise the contents,
    /// hashes and update time are replaced while the id is kept.
    async fn put_secrets(
        &self,
        url: &str,
        url_hash: &str,
        contents: &str,
    ) -> StorageResult<SecretsId>;

    /// Get the cached row for `url`
    async fn get_secrets(&self, url: &str) -> StorageResult<Option<SecretsRecord>>;

    /// Get the cached contents for `url`
    async fn get_contents(&self, url: &str) -> StorageResult<String>;

    /// Resolve a secrets id back to its URL
    async fn get_secrets_url_by_id(&self, id: SecretsId) -> StorageResult<String>;
}

/// Storage for poll cursor checkpoints
#[async_trait]
pub trait CursorStorage: Send + Sync {
    /// Last checkpointed position for the registry at `registry`
    async fn load_cursor(&self, registry: &str) -> StorageResult<Option<ChainPosition>>;

    /// Checkpoint the position for the registry at `registry`
    async fn save_cursor(&self, registry: &str, position: ChainPosition) -> StorageResult<()>;
}
