//! Pylon Runtime - configuration, logging and process lifecycle for the
//! Pylon bot host.
//!
//! This crate provides:
//! - [`PylonConfig`] and its figment-based [`ConfigLoader`]
//! - [`LoggingBuilder`] over `tracing-subscriber`
//! - [`PylonRuntime`], which starts the host, idles until a shutdown signal
//!   and stops it again
//!
//! ```ignore
//! use pylon_runtime::PylonRuntime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pylon_runtime::RuntimeError> {
//!     let client = my_platform::Client::connect().await?;
//!     let runtime = PylonRuntime::builder(client).build()?;
//!     runtime.run().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{
    BotConfig, ConfigError, ConfigLoader, ConfigResult, LoggingConfig, PluginsConfig, PylonConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{LANGUAGE_COLLECTION, PylonRuntime, RuntimeBuilder, STAFF_COLLECTION};

// Re-export tracing for use by plugin crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for plugin code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
