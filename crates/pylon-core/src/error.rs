//! Error types for the collaborator interfaces.
//!
//! Dispatch-level errors (argument conversion, plugin registration) live in
//! `pylon-framework`; this module only covers what the platform client and
//! the document store can report.

use thiserror::Error;

// =============================================================================
// Platform API Errors
// =============================================================================

/// Errors reported by a [`ChatClient`](crate::ChatClient) implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The peer (user, chat or username) could not be resolved.
    #[error("peer id invalid: {0}")]
    PeerIdInvalid(String),

    /// An edit was requested but the new content equals the old one.
    #[error("message not modified")]
    MessageNotModified,

    /// The platform asked us to slow down.
    #[error("flood wait: retry after {seconds}s")]
    FloodWait {
        /// Seconds the platform asked us to wait.
        seconds: u64,
    },

    /// The bot lacks the rights to perform the call.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The client is not connected.
    #[error("client not connected")]
    NotConnected,

    /// Any other platform failure.
    #[error("api error: {0}")]
    Other(String),
}

impl ApiError {
    /// Creates a generic API error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Creates a peer resolution error.
    pub fn peer_invalid(peer: impl Into<String>) -> Self {
        Self::PeerIdInvalid(peer.into())
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors reported by a [`DocumentStore`](crate::DocumentStore).
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backing store is unreachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A document or update could not be applied.
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for platform API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
