//! Test support for the workflow registry syncer
//!
//! In-memory stand-ins for everything the syncer talks to:
//! - [`FakeRegistry`]: registry contract with paging and injectable read failures
//! - [`StaticFetcher`]: artifact server that counts requests
//! - [`MockEngineFactory`]: engines that only track their lifecycle
//! - [`RecordingHandler`]: records the events the syncer delivers
//! - [`SyncHarness`]: all of the above wired to a real syncer and handler

pub mod engine;
pub mod fetcher;
pub mod fixtures;
pub mod handler;
pub mod harness;
pub mod ledger;

pub use engine::{MockEngine, MockEngineFactory};
pub use fetcher::StaticFetcher;
pub use fixtures::{owner, WorkflowFixture};
pub use handler::RecordingHandler;
pub use harness::{
    eventually, init_test_tracing, HarnessBuilder, SyncHarness, DON_ID, REGISTRY_ADDRESS,
};
pub use ledger::{FakeReaderFactory, FakeRegistry};
