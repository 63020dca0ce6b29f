//! Registry of running engines, keyed by workflow name.

use crate::error::{EngineError, EngineResult};
use crate::service::{HealthReport, Service, ServiceError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared reference to a running engine
pub type EngineHandle = Arc<dyn Service>;

/// Concurrency-safe map of workflow name to running engine.
///
/// At most one handle exists per name. Swapping a handle goes through
/// [`replace`](Self::replace), so concurrent lookups observe either the old
/// or the new handle and never an empty slot.
#[derive(Default)]
pub struct EngineRegistry {
    engines: DashMap<String, EngineHandle>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self {
            engines: DashMap::new(),
        }
    }

    /// Register a handle under `name`. Fails if one is already registered.
    pub fn register(&self, name: impl Into<String>, handle: EngineHandle) -> EngineResult<()> {
        match self.engines.entry(name.into()) {
            Entry::Occupied(entry) => Err(EngineError::AlreadyExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                debug!(workflow = %entry.key(), "Registered engine");
                entry.insert(handle);
                Ok(())
            }
        }
    }

    /// Install `handle` under `name`, returning the handle it displaced.
    ///
    /// The caller owns the displaced handle and is responsible for closing it.
    pub fn replace(&self, name: impl Into<String>, handle: EngineHandle) -> Option<EngineHandle> {
        let name = name.into();
        let previous = self.engines.insert(name.clone(), handle);
        if previous.is_some() {
            debug!(workflow = %name, "Replaced engine");
        }
        previous
    }

    pub fn get(&self, name: &str) -> EngineResult<EngineHandle> {
        self.engines
            .get(name)
            .map(|h| h.value().clone())
            .ok_or_else(|| EngineError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.engines.contains_key(name)
    }

    /// Remove and return the handle for `name`.
    pub fn unregister(&self, name: &str) -> EngineResult<EngineHandle> {
        self.engines
            .remove(name)
            .map(|(_, h)| h)
            .ok_or_else(|| EngineError::NotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        self.engines.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Health of every registered engine, merged into one report.
    pub fn health_report(&self) -> HealthReport {
        let handles: Vec<EngineHandle> = self.engines.iter().map(|e| e.value().clone()).collect();

        let mut report = HealthReport::new();
        for handle in handles {
            report.extend(handle.health_report());
        }
        report
    }

    /// Unregister every engine and close them concurrently. Returns the
    /// close failures.
    pub async fn close_all(&self) -> Vec<(String, ServiceError)> {
        let removed: Vec<(String, EngineHandle)> = self
            .names()
            .into_iter()
            .filter_map(|name| self.engines.remove(&name))
            .collect();

        let closing = removed.into_iter().map(|(name, handle)| async move {
            let result = handle.close().await;
            (name, result)
        });

        let mut failures = Vec::new();
        for (name, result) in join_all(closing).await {
            if let Err(e) = result {
                warn!(workflow = %name, error = %e, "Failed to close engine");
                failures.push((name, e));
            }
        }
        failures
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("engines", &self.names())
            .finish()
    }
}
