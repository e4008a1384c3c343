//! Layered error definitions
//!
//! Categorized by source: lifecycle / topology / config.
//! Capacity rejections and unbound keys are not errors; they are reported
//! through return values and counters.

use thiserror::Error;

/// Unified dispatcher error type
#[derive(Debug, Error)]
pub enum DispatchError {
    // ===== Lifecycle Errors =====
    /// The OS refused to spawn the worker thread
    #[error("failed to spawn worker '{worker}': {source}")]
    WorkerSpawn {
        worker: String,
        #[source]
        source: std::io::Error,
    },

    /// The worker thread panicked and could not be joined cleanly
    #[error("worker '{worker}' panicked: {message}")]
    WorkerPanicked { worker: String, message: String },

    // ===== Topology Errors =====
    /// Subscribe attempted while a fixed-topology dispatcher is running
    #[error("topology is frozen while running, cannot subscribe key {key}")]
    TopologyFrozen { key: String },

    // ===== Config Errors =====
    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },
}

impl DispatchError {
    /// Create worker spawn error
    pub fn worker_spawn(worker: impl Into<String>, source: std::io::Error) -> Self {
        Self::WorkerSpawn {
            worker: worker.into(),
            source,
        }
    }

    /// Create worker panic error
    pub fn worker_panicked(worker: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WorkerPanicked {
            worker: worker.into(),
            message: message.into(),
        }
    }

    /// Create topology frozen error
    pub fn topology_frozen(key: impl Into<String>) -> Self {
        Self::TopologyFrozen { key: key.into() }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Configuration loading error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration parse error
    #[error("config parse error: {message}")]
    Parse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    Validation { field: String, message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Create configuration parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<DispatchError> for ConfigError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::ConfigValidation { field, message } => Self::Validation {
                field: format!("dispatcher.{field}"),
                message,
            },
            other => Self::parse(other.to_string()),
        }
    }
}
