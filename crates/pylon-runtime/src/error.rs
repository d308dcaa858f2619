//! Runtime error types.

use pylon_core::{ApiError, StoreError};
use pylon_framework::PluginError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while starting, running or stopping the host.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A plugin failed to load at start-up.
    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// The platform client failed during start-up.
    #[error("platform error: {0}")]
    Api(#[from] ApiError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Shutdown signal handlers could not be installed.
    #[error("failed to listen for shutdown signals: {0}")]
    Signal(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
