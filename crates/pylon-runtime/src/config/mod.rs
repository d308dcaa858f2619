//! Configuration for the Pylon runtime.
//!
//! [`PylonConfig`] is loaded by [`ConfigLoader`] from defaults, `pylon.toml`
//! / `pylon.yaml`, `PYLON_*` environment variables and programmatic
//! overrides, then checked by [`validate_config`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, load_config, load_config_from_file};
pub use schema::{
    BotConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, PluginsConfig, PylonConfig,
    SpanEventConfig,
};
pub use validation::validate_config;
