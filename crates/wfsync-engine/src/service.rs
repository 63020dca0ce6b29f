//! Long-running service contract.
//!
//! Engines and the syncer itself share this lifecycle: start once, close
//! once, and report readiness and health while running.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU8, Ordering};
use thiserror::Error;

/// Health of a service and its sub-components, keyed by component name.
///
/// `Ok(())` marks a healthy component, `Err` carries the reason it is not.
pub type HealthReport = BTreeMap<String, Result<(), String>>;

/// Service lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("{0} has already been started")]
    AlreadyStarted(String),

    #[error("{0} has not been started")]
    NotStarted(String),

    #[error("{0} is stopped")]
    Stopped(String),

    #[error("{0}")]
    Failed(String),
}

/// A start/stop service with health reporting
#[async_trait]
pub trait Service: Send + Sync {
    /// Diagnostic label
    fn name(&self) -> String;

    /// Begin work. Returns once the service is running.
    async fn start(&self) -> Result<(), ServiceError>;

    /// Stop work and release resources.
    async fn close(&self) -> Result<(), ServiceError>;

    /// Whether the service is started and able to do work
    fn ready(&self) -> Result<(), ServiceError>;

    /// Health of the service and everything it owns
    fn health_report(&self) -> HealthReport;
}

const UNSTARTED: u8 = 0;
const STARTING: u8 = 1;
const STARTED: u8 = 2;
const STOPPED: u8 = 3;

/// One-shot lifecycle state shared by service implementations.
///
/// A service moves `unstarted -> starting -> started -> stopped` exactly
/// once; a failed start moves straight to stopped.
#[derive(Debug, Default)]
pub struct ServiceState {
    state: AtomicU8,
}

impl ServiceState {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(UNSTARTED),
        }
    }

    /// Claim the right to start. Fails if start was already attempted.
    pub fn begin_start(&self, name: &str) -> Result<(), ServiceError> {
        self.state
            .compare_exchange(UNSTARTED, STARTING, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| ServiceError::AlreadyStarted(name.to_string()))
    }

    /// Record the outcome of a start claimed with [`begin_start`](Self::begin_start).
    pub fn finish_start(&self, ok: bool) {
        let next = if ok { STARTED } else { STOPPED };
        self.state.store(next, Ordering::Release);
    }

    /// Claim the right to stop. Fails unless the service is running.
    pub fn begin_stop(&self, name: &str) -> Result<(), ServiceError> {
        match self
            .state
            .compare_exchange(STARTED, STOPPED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(STOPPED) => Err(ServiceError::Stopped(name.to_string())),
            Err(_) => Err(ServiceError::NotStarted(name.to_string())),
        }
    }

    pub fn ready(&self, name: &str) -> Result<(), ServiceError> {
        match self.state.load(Ordering::Acquire) {
            STARTED => Ok(()),
            STOPPED => Err(ServiceError::Stopped(name.to_string())),
            _ => Err(ServiceError::NotStarted(name.to_string())),
        }
    }
}
