//! Framework error types.
//!
//! - [`PluginError`]: registry failures (name collisions, invalid commands).
//! - [`ArgumentError`]: argument conversion failures.
//! - [`ResponseError`]: failures while answering a command.
//! - [`CommandError`]: everything that can go wrong while routing one command.
//!
//! Handler and listener bodies return [`BoxError`] so plugins can use whatever
//! error types they like.

use pylon_core::ApiError;
use thiserror::Error;
use tower::BoxError;

// =============================================================================
// PluginError
// =============================================================================

fn alias_prefix(alias: &bool) -> &'static str {
    if *alias { "alias of " } else { "" }
}

/// Errors raised while loading plugins and registering their commands.
#[derive(Debug, Error)]
pub enum PluginError {
    /// A plugin with the same name is already loaded.
    #[error("Plugin '{name}' already exists")]
    DuplicatePlugin { name: String },

    /// A command name or alias is already taken.
    #[error(
        "Attempt to replace existing command '{existing}' (from {existing_plugin}) with {}'{command}' (from {plugin})",
        alias_prefix(.alias)
    )]
    DuplicateCommand {
        existing: String,
        existing_plugin: String,
        command: String,
        plugin: String,
        /// `true` when the colliding token was one of the new command's aliases.
        alias: bool,
    },

    /// A command declared an unsupported parameter list.
    #[error(transparent)]
    InvalidCommand(#[from] ArgumentError),

    /// No plugin with this name is loaded.
    #[error("Plugin '{0}' is not loaded")]
    NotLoaded(String),
}

// =============================================================================
// ArgumentError
// =============================================================================

/// Errors produced while converting command tokens into handler arguments.
#[derive(Debug, Error)]
pub enum ArgumentError {
    /// A converter could not produce a value.
    #[error("Failed to convert on '{converter}', {source}")]
    Conversion { converter: String, source: BoxError },

    /// A boolean parameter received a token outside the accepted vocabulary.
    #[error("Unrecognized argument of boolean '{token}'")]
    BadBool { token: String },

    /// The parameter list itself is unsupported.
    #[error("{0}")]
    BadArgument(String),

    /// A converter returned a value of the wrong shape.
    #[error("Converter '{converter}' returned an unexpected result: {detail}")]
    BadResult { converter: String, detail: String },
}

impl ArgumentError {
    pub fn conversion(converter: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Conversion {
            converter: converter.into(),
            source: source.into(),
        }
    }

    pub fn bad_result(converter: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::BadResult {
            converter: converter.into(),
            detail: detail.into(),
        }
    }

    /// Maps a failed platform lookup. Whatever the cause, the converter
    /// produced no value, so a declared default still applies.
    pub fn from_api(converter: impl Into<String>, err: ApiError) -> Self {
        Self::conversion(converter, err)
    }

    /// Error for a variadic parameter found on `command`.
    pub fn variadic(param: &str, command: &str) -> Self {
        Self::BadArgument(format!(
            "Unsupported variable positional argument conversion found '*{param}' on '{command}'"
        ))
    }

    /// `true` for failures a declared default may recover from.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Conversion { .. } | Self::BadBool { .. })
    }
}

// =============================================================================
// ResponseError / CommandError
// =============================================================================

/// Errors produced while sending or editing a response.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// An unknown response mode string.
    #[error("Invalid response mode '{0}'")]
    InvalidMode(String),
}

impl ResponseError {
    /// `true` when the platform rejected an edit because nothing changed.
    pub fn is_not_modified(&self) -> bool {
        matches!(self, Self::Api(ApiError::MessageNotModified))
    }
}

/// Errors surfaced by [`CommandRouter::handle`](crate::router::CommandRouter::handle).
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    /// The handler itself failed.
    #[error("Command '{command}' (from {plugin}) failed: {source}")]
    Invoke {
        command: String,
        plugin: String,
        source: BoxError,
    },

    #[error(transparent)]
    Response(#[from] ResponseError),
}

impl CommandError {
    pub fn is_not_modified(&self) -> bool {
        matches!(self, Self::Response(e) if e.is_not_modified())
    }
}

/// Result type for registry operations.
pub type PluginResult<T> = Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_command_message_mentions_alias() {
        let err = PluginError::DuplicateCommand {
            existing: "note".into(),
            existing_plugin: "Notes".into(),
            command: "save".into(),
            plugin: "Other".into(),
            alias: true,
        };
        assert_eq!(
            err.to_string(),
            "Attempt to replace existing command 'note' (from Notes) with alias of 'save' (from Other)"
        );
    }

    #[test]
    fn conversion_message_names_converter() {
        let err = ArgumentError::conversion("UserConverter", "peer id invalid: @ghost");
        assert_eq!(
            err.to_string(),
            "Failed to convert on 'UserConverter', peer id invalid: @ghost"
        );
        assert!(err.is_recoverable());
        assert!(!ArgumentError::bad_result("x", "y").is_recoverable());
    }

    #[test]
    fn every_lookup_failure_is_recoverable() {
        let unknown = ArgumentError::from_api("UserConverter", ApiError::peer_invalid("@ghost"));
        assert!(unknown.is_recoverable());

        let offline = ArgumentError::from_api("UserConverter", ApiError::NotConnected);
        assert!(offline.is_recoverable());
        assert_eq!(
            offline.to_string(),
            "Failed to convert on 'UserConverter', client not connected"
        );
    }
}
