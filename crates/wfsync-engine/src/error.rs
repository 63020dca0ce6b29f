//! Engine error types

use crate::service::ServiceError;
use thiserror::Error;

/// Engine lifecycle and lookup errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine not found: {0}")]
    NotFound(String),

    #[error("Engine already registered: {0}")]
    AlreadyExists(String),

    #[error("Engine factory failed for {name}: {reason}")]
    Factory { name: String, reason: String },

    #[error("Engine {name} failed to start: {source}")]
    Start {
        name: String,
        #[source]
        source: ServiceError,
    },

    #[error("Engine {name} failed to close: {source}")]
    Close {
        name: String,
        #[source]
        source: ServiceError,
    },
}

impl EngineError {
    /// Whether the error only says no engine is running under the name
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}

/// Result type for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;
