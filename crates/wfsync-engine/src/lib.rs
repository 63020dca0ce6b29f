//! Workflow syncer engines
//!
//! The syncer never executes workflows itself. It builds engines through an
//! [`EngineFactory`], drives them through the [`Service`] lifecycle and keeps
//! the live ones in an [`EngineRegistry`] keyed by workflow name.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod factory;
pub mod registry;
pub mod service;

// Re-exports
pub use error::{EngineError, EngineResult};
pub use factory::{EngineFactory, EngineRequest};
pub use registry::{EngineHandle, EngineRegistry};
pub use service::{HealthReport, Service, ServiceError, ServiceState};
