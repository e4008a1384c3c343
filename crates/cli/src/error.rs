//! Error types for CLI operations.

use contracts::{ConfigError, DispatchError};
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration load or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Dispatcher construction or lifecycle error
    #[error("Dispatcher error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Producer thread could not be spawned or joined
    #[error("Producer {index} failed: {message}")]
    Producer { index: usize, message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn producer(index: usize, message: impl Into<String>) -> Self {
        Self::Producer {
            index,
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
