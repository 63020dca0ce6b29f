//! Configuration for the workflow registry syncer

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main syncer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncerSettings {
    /// Registry contract location
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Polling configuration
    #[serde(default)]
    pub syncer: SyncerConfig,

    /// Event handler configuration
    #[serde(default)]
    pub handler: HandlerConfig,

    /// Artifact fetcher configuration
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SyncerSettings {
    /// Load configuration from defaults, an optional file and `WFSYNC_` env vars
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&SyncerSettings::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("WFSYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: SyncerSettings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry.address.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "registry.address must not be empty".to_string(),
            ));
        }
        self.syncer.validate()?;
        self.fetcher.validate()
    }
}

/// Registry contract configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Address of the workflow registry contract
    #[serde(default = "default_registry_address")]
    pub address: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            address: default_registry_address(),
        }
    }
}

/// What to do when applying one event fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyFailurePolicy {
    /// Log the failure, record it in health and move on to the next event
    #[default]
    Continue,

    /// Stop the cycle so the failed event is redelivered on the next tick
    HaltCycle,
}

/// Polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncerConfig {
    /// Page size for workflow listing and event reads
    #[serde(default = "default_query_count")]
    pub query_count: u64,

    /// Poll interval in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Maximum event pages drained per tick
    #[serde(default = "default_max_pages")]
    pub max_pages_per_tick: u32,

    /// Handling of per-event failures
    #[serde(default)]
    pub apply_failure_policy: ApplyFailurePolicy,

    /// Give up waiting for DON membership after this many seconds (0 waits forever)
    #[serde(default)]
    pub don_wait_timeout_secs: u64,
}

impl Default for SyncerConfig {
    fn default() -> Self {
        Self {
            query_count: default_query_count(),
            poll_interval_ms: default_poll_interval(),
            max_pages_per_tick: default_max_pages(),
            apply_failure_policy: ApplyFailurePolicy::Continue,
            don_wait_timeout_secs: 0,
        }
    }
}

impl SyncerConfig {
    pub fn with_query_count(mut self, query_count: u64) -> Self {
        self.query_count = query_count;
        self
    }

    pub fn with_apply_failure_policy(mut self, policy: ApplyFailurePolicy) -> Self {
        self.apply_failure_policy = policy;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn don_wait_timeout(&self) -> Option<Duration> {
        (self.don_wait_timeout_secs > 0).then(|| Duration::from_secs(self.don_wait_timeout_secs))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query_count == 0 {
            return Err(ConfigError::Invalid(
                "syncer.query_count must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "syncer.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_pages_per_tick == 0 {
            return Err(ConfigError::Invalid(
                "syncer.max_pages_per_tick must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Event handler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Check that fetched artifacts hash to the registered workflow id
    #[serde(default = "default_true")]
    pub verify_workflow_id: bool,

    /// Capacity of the notification broadcast channel
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            verify_workflow_id: true,
            notification_capacity: default_notification_capacity(),
        }
    }
}

/// Artifact fetcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Request timeout in seconds
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Maximum response size in bytes
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_response_bytes == 0 {
            return Err(ConfigError::Invalid(
                "fetcher.max_response_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level, used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_registry_address() -> String {
    "0x0000000000000000000000000000000000000000".to_string()
}

fn default_query_count() -> u64 {
    100
}

fn default_poll_interval() -> u64 {
    12_000
}

fn default_max_pages() -> u32 {
    10
}

fn default_notification_capacity() -> usize {
    256
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_max_response_bytes() -> usize {
    20 * 1024 * 1024 // 20MB
}

fn default_log_level() -> String {
    "info".to_string()
}
