//! Workflow registry syncer
//!
//! Keeps the workflow engines running on a node in step with an on-chain
//! workflow registry:
//! - Backfills every workflow assigned to the node's DON at startup
//! - Polls registry logs and applies them strictly in chain order
//! - Caches secrets and refreshes them on request
//! - Starts, replaces and stops engines as workflows change state
//!
//! ## Wiring
//!
//! ```ignore
//! let handler = WorkflowEventHandler::new(store.clone(), fetcher, engine_factory);
//! let syncer = WorkflowRegistry::new(
//!     reader_factory,
//!     settings.registry.address.clone(),
//!     settings.syncer.clone(),
//!     Arc::new(handler),
//!     don_notifier,
//! )
//! .with_checkpoints(store);
//! syncer.start().await?;
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod config;
pub mod decode;
pub mod don;
pub mod error;
pub mod fetcher;
pub mod handler;
pub mod logging;
pub mod reader;
pub mod syncer;
pub mod ticker;

pub use crate::config::{
    ApplyFailurePolicy, FetcherConfig, HandlerConfig, LoggingConfig, RegistryConfig,
    SyncerConfig, SyncerSettings,
};
pub use decode::{decode_log, encode_event};
pub use don::{DonNotifier, WatchDonNotifier};
pub use error::{
    ConfigError, DecodeError, DonError, FetchError, HandlerError, HandlerResult, ReaderError,
    ReaderResult, SyncerError, SyncerResult,
};
pub use fetcher::{FnFetcher, HttpFetcher, SecretsFetcher};
pub use handler::{EventHandler, SyncNotification, WorkflowEventHandler};
pub use logging::init_tracing;
pub use reader::{ContractReader, ContractReaderFactory, PageToken, RawLog, WorkflowPage};
pub use syncer::{WorkflowRegistry, SYNCER_NAME};
pub use ticker::TickSource;

// Re-export the layers the syncer is assembled from
pub use wfsync_engine as engine;
pub use wfsync_store as store;
pub use wfsync_types as types;
