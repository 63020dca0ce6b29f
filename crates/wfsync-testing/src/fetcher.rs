//! Static artifact server

use crate::fixtures::WorkflowFixture;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use wfsync::{FetchError, SecretsFetcher};

#[derive(Default)]
struct Published {
    bodies: HashMap<String, Vec<u8>>,
    calls: HashMap<String, usize>,
}

/// Serves fixed bodies per URL and counts requests
#[derive(Default)]
pub struct StaticFetcher {
    inner: Mutex<Published>,
}

impl StaticFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.inner.lock().bodies.insert(url.to_string(), body.into());
    }

    pub fn remove(&self, url: &str) {
        self.inner.lock().bodies.remove(url);
    }

    /// Publish a workflow's artifacts the way a workflow author would.
    ///
    /// The binary is served base64 encoded. Secrets default to `"contents"`
    /// unless something is already published at the secrets URL.
    pub fn publish(&self, workflow: &WorkflowFixture) {
        let mut inner = self.inner.lock();
        inner.bodies.insert(
            workflow.binary_url(),
            BASE64.encode(workflow.binary()).into_bytes(),
        );
        inner.bodies.insert(workflow.config_url(), workflow.config());
        if workflow.has_secrets() {
            inner
                .bodies
                .entry(workflow.secrets_url())
                .or_insert_with(|| b"contents".to_vec());
        }
    }

    pub fn calls(&self, url: &str) -> usize {
        self.inner.lock().calls.get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.inner.lock().calls.values().sum()
    }
}

#[async_trait]
impl SecretsFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut inner = self.inner.lock();
        *inner.calls.entry(url.to_string()).or_insert(0) += 1;
        inner
            .bodies
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}
