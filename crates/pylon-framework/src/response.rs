//! Outgoing responses and the policies applied before they are sent.

use std::str::FromStr;
use std::time::Duration;

use pylon_core::{Media, MessageId};
use serde::{Deserialize, Serialize};

use crate::error::ResponseError;

/// Longest text the platform accepts in one message, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 4096;

/// Appended to texts cut down to [`MAX_MESSAGE_LENGTH`].
pub const TRUNCATION_SUFFIX: &str = "... (truncated)";

/// Replacement for redacted secrets.
pub const REDACTED: &str = "[REDACTED]";

/// How a response relates to the previous one of the same invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseMode {
    /// Edit the last response, or reply if there is none.
    #[default]
    Edit,
    /// Always send a new reply.
    Reply,
}

impl FromStr for ResponseMode {
    type Err = ResponseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "edit" => Ok(Self::Edit),
            "reply" => Ok(Self::Reply),
            other => Err(ResponseError::InvalidMode(other.to_string())),
        }
    }
}

/// What to do with the old response when media forces a resend in edit mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaEditPolicy {
    /// Log a failed delete and send the new message anyway.
    #[default]
    BestEffort,
    /// Abort the response when the delete fails.
    Strict,
}

/// A response to send for a command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub text: String,
    pub media: Option<Media>,
    pub mode: ResponseMode,
    /// Replace configured secrets before sending.
    pub redact: bool,
    /// Delete the response after this delay.
    pub delete_after: Option<Duration>,
    /// Reply to this message instead of the invoking one.
    pub reply_to: Option<MessageId>,
}

impl Response {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media: None,
            mode: ResponseMode::Edit,
            redact: true,
            delete_after: None,
            reply_to: None,
        }
    }

    pub fn media(mut self, media: Media) -> Self {
        self.media = Some(media);
        self
    }

    pub fn mode(mut self, mode: ResponseMode) -> Self {
        self.mode = mode;
        self
    }

    /// Shorthand for `mode(ResponseMode::Reply)`.
    pub fn reply(self) -> Self {
        self.mode(ResponseMode::Reply)
    }

    pub fn redact(mut self, redact: bool) -> Self {
        self.redact = redact;
        self
    }

    pub fn delete_after(mut self, delay: Duration) -> Self {
        self.delete_after = Some(delay);
        self
    }

    pub fn reply_to(mut self, message_id: MessageId) -> Self {
        self.reply_to = Some(message_id);
        self
    }
}

impl From<String> for Response {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&str> for Response {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// Cuts `text` to [`MAX_MESSAGE_LENGTH`] characters, suffix included.
pub fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_LENGTH {
        return text.to_string();
    }
    let keep = MAX_MESSAGE_LENGTH - TRUNCATION_SUFFIX.chars().count();
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_SUFFIX);
    out
}

/// Replaces every non-empty secret in `text` with [`REDACTED`].
pub fn redact<S: AsRef<str>>(text: &str, secrets: &[S]) -> String {
    secrets
        .iter()
        .map(AsRef::as_ref)
        .filter(|s| !s.is_empty())
        .fold(text.to_string(), |acc, secret| acc.replace(secret, REDACTED))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate("hello"), "hello");
        let exact = "x".repeat(MAX_MESSAGE_LENGTH);
        assert_eq!(truncate(&exact), exact);
    }

    #[test]
    fn truncate_appends_suffix() {
        let long = "é".repeat(MAX_MESSAGE_LENGTH + 10);
        let out = truncate(&long);
        assert_eq!(out.chars().count(), MAX_MESSAGE_LENGTH);
        assert!(out.ends_with(TRUNCATION_SUFFIX));
    }

    #[test]
    fn redact_replaces_secrets() {
        let secrets = ["123:abc", ""];
        assert_eq!(
            redact("token is 123:abc, again 123:abc", &secrets),
            "token is [REDACTED], again [REDACTED]"
        );
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("reply".parse::<ResponseMode>().unwrap(), ResponseMode::Reply);
        assert!(matches!(
            "shout".parse::<ResponseMode>(),
            Err(ResponseError::InvalidMode(m)) if m == "shout"
        ));
    }
}
