//! Error types for the syncer

use thiserror::Error;
use wfsync_engine::{EngineError, ServiceError};
use wfsync_store::StorageError;
use wfsync_types::{ChainPosition, Owner, WorkflowId};

/// Contract reader errors
#[derive(Debug, Clone, Error)]
pub enum ReaderError {
    /// The reader could not be opened for the registry address
    #[error("Contract reader unavailable: {0}")]
    Unavailable(String),

    /// A read against the registry failed
    #[error("Contract read failed: {0}")]
    Read(String),
}

/// Errors fetching remote artifacts
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Response from {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },

    #[error("Fetcher misconfigured: {0}")]
    Client(String),
}

/// DON membership errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DonError {
    #[error("Waiting for DON membership was cancelled")]
    Cancelled,

    #[error("Timed out waiting for DON membership")]
    Timeout,

    #[error("DON membership unavailable: {0}")]
    Unavailable(String),
}

/// Registry log decoding errors
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    #[error("Unknown registry event type {event_type:?} at {position}")]
    UnknownEventType {
        event_type: String,
        position: ChainPosition,
    },

    #[error("Malformed {event_type} payload at {position}: {reason}")]
    MalformedPayload {
        event_type: String,
        position: ChainPosition,
        reason: String,
    },
}

/// Errors applying a single event
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("No spec for workflow {name} owned by {owner}")]
    SpecNotFound { owner: Owner, name: String },

    #[error("Workflow {name}: registered id {expected} does not match artifacts ({computed})")]
    WorkflowIdMismatch {
        name: String,
        expected: WorkflowId,
        computed: WorkflowId,
    },

    #[error("Workflow {name}: binary is not valid base64: {reason}")]
    InvalidBinary { name: String, reason: String },

    #[error("Secrets at {url} are not valid UTF-8")]
    InvalidSecrets { url: String },

    #[error("Secrets at {url} are registered to a different owner")]
    SecretsNotAuthorized { url: String },
}

/// Syncer service errors
#[derive(Debug, Error)]
pub enum SyncerError {
    #[error("DON membership unavailable: {0}")]
    DonUnavailable(#[source] DonError),

    #[error("Failed to open contract reader: {0}")]
    ReaderUnavailable(#[source] ReaderError),

    #[error("Failed to restore cursor: {0}")]
    Checkpoint(#[source] StorageError),

    #[error("Syncer closed during startup")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias for reader operations
pub type ReaderResult<T> = Result<T, ReaderError>;

/// Result type alias for handler operations
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Result type alias for syncer operations
pub type SyncerResult<T> = Result<T, SyncerError>;
