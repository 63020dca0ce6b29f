//! Workflow syncer storage
//!
//! Persistence for the syncer's local view of the registry:
//!
//! - **SpecStorage**: one [`WorkflowSpec`](wfsync_types::WorkflowSpec) per `(owner, name)`
//! - **SecretsStorage**: cached secrets content keyed by URL
//! - **CursorStorage**: poll cursor checkpoints keyed by registry address
//!
//! The in-memory backend is suitable for development and testing.
//! Production nodes plug a database-backed implementation of the same
//! traits.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryStore;
pub use traits::{CursorStorage, SecretsStorage, SpecStorage, WorkflowStore};
