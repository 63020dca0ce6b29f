//! In-memory storage implementation

use crate::error::{StorageError, StorageResult};
use crate::traits::{CursorStorage, SecretsStorage, SpecStorage};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use wfsync_types::{
    content_hash, ChainPosition, Owner, SecretsId, SecretsRecord, WorkflowKey, WorkflowSpec,
};

/// In-memory storage for development and testing
#[derive(Debug)]
pub struct InMemoryStore {
    specs: Arc<RwLock<HashMap<WorkflowKey, WorkflowSpec>>>,
    secrets: Arc<RwLock<HashMap<String, SecretsRecord>>>,
    cursors: Arc<RwLock<HashMap<String, ChainPosition>>>,
    secrets_sequence: Arc<AtomicU64>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            specs: Arc::new(RwLock::new(HashMap::new())),
            secrets: Arc::new(RwLock::new(HashMap::new())),
            cursors: Arc::new(RwLock::new(HashMap::new())),
            secrets_sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of persisted specs
    pub async fn spec_count(&self) -> usize {
        self.specs.read().await.len()
    }
}

#[async_trait]
impl SpecStorage for InMemoryStore {
    async fn get_spec(&self, owner: &Owner, name: &str) -> StorageResult<Option<WorkflowSpec>> {
        let specs = self.specs.read().await;
        Ok(specs.get(&WorkflowKey::derive(owner, name)).cloned())
    }

    async fn list_specs(&self) -> StorageResult<Vec<WorkflowSpec>> {
        let specs = self.specs.read().await;
        Ok(specs.values().cloned().collect())
    }

    async fn upsert_spec(&self, spec: WorkflowSpec) -> StorageResult<()> {
        if spec.name.is_empty() {
            return Err(StorageError::InvalidData(
                "workflow spec must have a name".to_string(),
            ));
        }
        let mut specs = self.specs.write().await;
        specs.insert(spec.key(), spec);
        Ok(())
    }

    async fn delete_spec(&self, owner: &Owner, name: &str) -> StorageResult<bool> {
        let mut specs = self.specs.write().await;
        Ok(specs.remove(&WorkflowKey::derive(owner, name)).is_some())
    }
}

#[async_trait]
impl SecretsStorage for InMemoryStore {
    async fn put_secrets(
        &self,
        url: &str,
        url_hash: &str,
        contents: &str,
    ) -> StorageResult<SecretsId> {
        let now = Utc::now();
        let mut secrets = self.secrets.write().await;

        if let Some(existing) = secrets.get_mut(url) {
            existing.url_hash = url_hash.to_string();
            existing.content_hash = content_hash(contents.as_bytes());
            existing.contents = contents.to_string();
            existing.updated_at = now;
            return Ok(existing.id);
        }

        let id = SecretsId::new(self.secrets_sequence.fetch_add(1, Ordering::SeqCst) + 1);
        secrets.insert(
            url.to_string(),
            SecretsRecord::new(id, url, url_hash, contents, now),
        );
        Ok(id)
    }

    async fn get_secrets(&self, url: &str) -> StorageResult<Option<SecretsRecord>> {
        let secrets = self.secrets.read().await;
        Ok(secrets.get(url).cloned())
    }

    async fn get_contents(&self, url: &str) -> StorageResult<String> {
        let secrets = self.secrets.read().await;
        secrets
            .get(url)
            .map(|s| s.contents.clone())
            .ok_or_else(|| StorageError::NotFound(format!("secrets for {}", url)))
    }

    async fn get_secrets_url_by_id(&self, id: SecretsId) -> StorageResult<String> {
        let secrets = self.secrets.read().await;
        secrets
            .values()
            .find(|s| s.id == id)
            .map(|s| s.url.clone())
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl CursorStorage for InMemoryStore {
    async fn load_cursor(&self, registry: &str) -> StorageResult<Option<ChainPosition>> {
        let cursors = self.cursors.read().await;
        Ok(cursors.get(registry).copied())
    }

    async fn save_cursor(&self, registry: &str, position: ChainPosition) -> StorageResult<()> {
        let mut cursors = self.cursors.write().await;
        cursors.insert(registry.to_string(), position);
        Ok(())
    }
}
