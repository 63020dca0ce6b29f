//! Workflow syncer types - shared domain model
//!
//! A node mirrors the state of an on-chain workflow registry contract and
//! runs an engine for every workflow that is registered, active and
//! assigned to the node's DON. This crate holds the types every layer
//! agrees on.
//!
//! ## Key Concepts
//!
//! - **WorkflowRecord**: on-chain truth returned by the registry listing
//! - **Event**: a decoded registry log, ordered by [`ChainPosition`]
//! - **WorkflowSpec**: the locally persisted mirror of a workflow
//! - **SecretsRecord**: cached secrets content, keyed by URL
//! - **Identifiers**: content-derived ids and owner/name keys

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod events;
pub mod ids;
pub mod position;
pub mod secrets;
pub mod workflow;

// Re-export main types
pub use events::{
    ActivatedPayload, DeletedPayload, Event, EventPayload, EventType, ForceUpdateSecretsPayload,
    PausedPayload, RegisteredPayload, UpdatedPayload,
};
pub use ids::{Don, DonId, IdError, Owner, SecretsId, WorkflowId, WorkflowKey};
pub use position::ChainPosition;
pub use secrets::{content_hash, secrets_url_hash, SecretsRecord};
pub use workflow::{StatusError, WorkflowRecord, WorkflowSpec, WorkflowStatus};
