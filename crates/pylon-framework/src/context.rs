//! Per-invocation command context.
//!
//! The router builds one [`Context`] for every recognized command and hands it
//! to the handler behind an `Arc`. It carries the triggering message, the text
//! split the way handlers usually need it, and the last response sent for this
//! invocation so that follow-up responses edit it instead of piling up
//! replies.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use pylon_core::{ApiResult, Chat, ChatAction, Message, User};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::bot::Bot;
use crate::error::ResponseError;
use crate::response::Response;

/// How often [`ChatActionGuard`] repeats its action.
pub const CHAT_ACTION_INTERVAL: Duration = Duration::from_secs(1);

/// State for one command invocation.
///
/// # Text views
///
/// For the message `/note@pylon_bot save  hello world`:
///
/// | field | value |
/// |-------|-------|
/// | [`invoker`](Self::invoker) | `note` |
/// | [`input`](Self::input) | `save  hello world` |
/// | [`segments`](Self::segments) | `["note", "save", "hello", "world"]` |
/// | [`args`](Self::args) | `["save", "hello", "world"]` |
///
/// [`input_raw`](Self::input_raw) is the same slice as `input` taken from the
/// markdown rendering, so formatting survives.
pub struct Context {
    bot: Bot,
    message: Arc<Message>,
    command: String,
    invoker: String,
    input: String,
    input_raw: String,
    segments: Vec<String>,
    args: OnceLock<Vec<String>>,
    response: Mutex<Option<Message>>,
}

impl Context {
    /// Creates the context for `message`, which invoked `command` through the
    /// token `invoker` (prefix and bot mention already stripped).
    pub fn new(bot: Bot, message: Arc<Message>, command: impl Into<String>, invoker: &str) -> Self {
        let text = message.text.as_deref().unwrap_or_default();
        let input = after_first_token(text).to_string();
        let input_raw = after_first_token(message.markdown().unwrap_or_default()).to_string();

        let invoker = invoker.to_lowercase();
        let segments = std::iter::once(invoker.clone())
            .chain(text.split_whitespace().skip(1).map(str::to_string))
            .collect();

        Self {
            bot,
            message,
            command: command.into(),
            invoker,
            input,
            input_raw,
            segments,
            args: OnceLock::new(),
            response: Mutex::new(None),
        }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// The message that triggered the command.
    pub fn message(&self) -> &Arc<Message> {
        &self.message
    }

    /// Canonical name of the invoked command.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The token actually typed. Equals the command name or one of its aliases.
    pub fn invoker(&self) -> &str {
        &self.invoker
    }

    pub fn author(&self) -> Option<&User> {
        self.message.from.as_ref()
    }

    pub fn chat(&self) -> &Chat {
        &self.message.chat
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_raw(&self) -> &str {
        &self.input_raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Every segment after the invoker. Computed on first access.
    pub fn args(&self) -> &[String] {
        self.args
            .get_or_init(|| self.segments.iter().skip(1).cloned().collect())
    }

    /// The last message sent or edited for this invocation.
    pub fn response(&self) -> Option<Message> {
        self.response.lock().clone()
    }

    /// Resolves a localized text in this chat's language.
    pub fn text(&self, key: &str, args: &[&str]) -> String {
        self.bot.text(self.chat().id, key, args)
    }

    // ─── Responding ──────────────────────────────────────────────────────────

    /// Sends or edits the response for this invocation.
    ///
    /// The first call replies to the invoking message. Later calls in
    /// [`ResponseMode::Edit`](crate::response::ResponseMode::Edit) edit that
    /// reply. With `delete_after` set, the response is scheduled for deletion
    /// and forgotten, so the next call sends a fresh message.
    pub async fn respond(&self, response: impl Into<Response>) -> Result<Message, ResponseError> {
        let response = response.into();
        let delete_after = response.delete_after;
        let previous = self.response();

        let sent = self
            .bot
            .respond(&self.message, response, previous.as_ref())
            .await?;
        *self.response.lock() = Some(sent.clone());

        if let Some(delay) = delete_after {
            self.delete(Some(delay)).await;
            *self.response.lock() = None;
        }
        Ok(sent)
    }

    /// Deletes the current response, now or after `delay`.
    ///
    /// Failures are logged and otherwise ignored. A delayed delete runs in the
    /// background and does not hold up the caller.
    pub async fn delete(&self, delay: Option<Duration>) {
        if let Some(message) = self.response() {
            self.delete_message(message, delay).await;
        }
    }

    /// Deletes `message`, now or after `delay`, ignoring failures.
    pub async fn delete_message(&self, message: Message, delay: Option<Duration>) {
        let bot = self.bot.clone();
        let run = async move {
            if let Err(e) = bot.delete_message(&message).await {
                debug!(message_id = message.id, error = %e, "Failed to delete message");
            }
        };
        match delay {
            Some(delay) if !delay.is_zero() => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    run.await;
                });
            }
            _ => run.await,
        }
    }

    // ─── Chat actions ────────────────────────────────────────────────────────

    /// Shows `action` once in the invoking chat.
    pub async fn trigger_action(&self, action: ChatAction) -> ApiResult<()> {
        self.bot
            .client()
            .send_chat_action(self.chat().id, action)
            .await
    }

    /// Shows `action` until the returned guard is dropped.
    ///
    /// The action is repeated every [`CHAT_ACTION_INTERVAL`]. Dropping the
    /// guard stops the loop and sends [`ChatAction::Cancel`].
    ///
    /// ```rust,ignore
    /// let _typing = ctx.action(ChatAction::Typing);
    /// let report = build_report().await;
    /// ctx.respond(report).await?;
    /// ```
    pub fn action(&self, action: ChatAction) -> ChatActionGuard {
        let token = CancellationToken::new();
        let client = self.bot.client().clone();
        let chat_id = self.chat().id;
        let cancelled = token.clone();

        tokio::spawn(async move {
            loop {
                if let Err(e) = client.send_chat_action(chat_id, action).await {
                    debug!(chat_id, action = action.as_str(), error = %e, "Chat action failed");
                }
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = tokio::time::sleep(CHAT_ACTION_INTERVAL) => {}
                }
            }
            if let Err(e) = client.send_chat_action(chat_id, ChatAction::Cancel).await {
                debug!(chat_id, error = %e, "Failed to cancel chat action");
            }
        });

        ChatActionGuard { token }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("command", &self.command)
            .field("invoker", &self.invoker)
            .field("chat", &self.message.chat.id)
            .field("message", &self.message.id)
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}

/// Keeps a chat action visible while alive.
#[must_use = "the chat action stops as soon as the guard is dropped"]
pub struct ChatActionGuard {
    token: CancellationToken,
}

impl Drop for ChatActionGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// The text after the first whitespace-delimited token, leading blanks removed.
fn after_first_token(text: &str) -> &str {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(end) => text[end..].trim_start(),
        None => "",
    }
}
