//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use pylon_core::UserId;
use pylon_framework::{BotSettings, MediaEditPolicy};
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PylonConfig {
    pub bot: BotConfig,
    pub plugins: PluginsConfig,
    pub logging: LoggingConfig,
}

// ─── bot ─────────────────────────────────────────────────────────────────────

/// Host settings, turned into [`BotSettings`] at start-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Token that marks a message as a command.
    pub command_prefix: String,

    /// Account with full rights.
    pub owner_id: Option<UserId>,

    /// Strings never echoed back in responses.
    pub secrets: Vec<String>,

    pub media_edit_policy: MediaEditPolicy,

    pub max_flood_retries: u32,

    pub default_language: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        let settings = BotSettings::default();
        Self {
            command_prefix: settings.command_prefix,
            owner_id: settings.owner_id,
            secrets: settings.secrets,
            media_edit_policy: settings.media_edit_policy,
            max_flood_retries: settings.max_flood_retries,
            default_language: settings.default_language,
        }
    }
}

impl BotConfig {
    pub fn to_settings(&self) -> BotSettings {
        BotSettings {
            command_prefix: self.command_prefix.clone(),
            owner_id: self.owner_id,
            secrets: self.secrets.clone(),
            media_edit_policy: self.media_edit_policy,
            max_flood_retries: self.max_flood_retries,
            default_language: self.default_language.clone(),
        }
    }
}

// ─── plugins ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Plugin names never loaded at start-up.
    pub disabled: Vec<String>,

    /// Load the custom plugin set after the built-in one.
    pub load_custom: bool,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            disabled: Vec::new(),
            load_custom: true,
        }
    }
}

// ─── logging ─────────────────────────────────────────────────────────────────

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Needs the `json-log` feature; falls back to `full` without it.
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// Written to `logging.file_path`.
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    pub file_path: Option<PathBuf>,

    /// Per-target levels, e.g. `pylon_framework = "debug"`.
    pub filters: BTreeMap<String, LogLevel>,

    pub span_events: SpanEventConfig,
    pub thread_ids: bool,
    /// Include file and line of each event.
    pub file_location: bool,
}
