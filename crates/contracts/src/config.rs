//! Dispatcher and harness configuration
//!
//! `DispatcherConfig` is consumed by every variant; `BenchConfig` is the
//! document produced by the config loader for the load harness.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::Variant;

/// Default per-key (or global, for split-lock) queue bound
pub const DEFAULT_CAPACITY: usize = 1000;

/// Default OS thread name of the worker
pub const DEFAULT_WORKER_NAME: &str = "dispatch-worker";

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct DispatcherConfig {
    /// Maximum number of pending values per queue
    #[serde(default = "default_capacity")]
    #[validate(range(min = 1, message = "capacity must be >= 1"))]
    pub capacity: usize,

    /// Run one last delivery sweep after shutdown is observed
    #[serde(default)]
    pub drain_on_stop: bool,

    /// Worker thread name
    #[serde(default = "default_worker_name")]
    #[validate(length(min = 1, message = "worker_name must not be empty"))]
    pub worker_name: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            drain_on_stop: false,
            worker_name: default_worker_name(),
        }
    }
}

impl DispatcherConfig {
    /// Default config with a custom capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Enable or disable the final drain on stop
    pub fn drain_on_stop(mut self, drain: bool) -> Self {
        self.drain_on_stop = drain;
        self
    }
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_worker_name() -> String {
    DEFAULT_WORKER_NAME.to_string()
}

/// Load harness configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BenchConfig {
    /// Dispatcher variant under test
    #[serde(default)]
    pub variant: Variant,

    /// Number of topics, each bound to its own consumer
    #[serde(default = "default_topics")]
    #[validate(range(min = 1, message = "topics must be >= 1"))]
    pub topics: u64,

    /// Number of producer threads
    #[serde(default = "default_producers")]
    #[validate(range(min = 1, message = "producers must be >= 1"))]
    pub producers: usize,

    /// Delay between two enqueues of one producer (microseconds)
    #[serde(default = "default_producer_period_us")]
    #[validate(range(min = 1, message = "producer_period_us must be >= 1"))]
    pub producer_period_us: u64,

    /// Run duration (seconds)
    #[serde(default = "default_duration_secs")]
    #[validate(range(min = 1, message = "duration_secs must be >= 1"))]
    pub duration_secs: u64,

    /// Payload size of each produced value (bytes)
    #[serde(default = "default_payload_bytes")]
    pub payload_bytes: usize,

    /// Dispatcher settings
    #[serde(default)]
    #[validate(nested)]
    pub dispatcher: DispatcherConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            topics: default_topics(),
            producers: default_producers(),
            producer_period_us: default_producer_period_us(),
            duration_secs: default_duration_secs(),
            payload_bytes: default_payload_bytes(),
            dispatcher: DispatcherConfig::default(),
        }
    }
}

fn default_topics() -> u64 {
    1_000_000
}

fn default_producers() -> usize {
    15
}

fn default_producer_period_us() -> u64 {
    1000
}

fn default_duration_secs() -> u64 {
    10
}

fn default_payload_bytes() -> usize {
    16
}
