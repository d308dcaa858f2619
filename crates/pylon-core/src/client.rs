//! The chat-platform client collaborator.
//!
//! The host never talks to the network itself. Everything it needs from the
//! platform goes through [`ChatClient`]: sending and editing messages, looking
//! up peers and memberships, and subscribing handlers to inbound updates.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::model::{Chat, ChatId, ChatMember, Media, Message, MessageId, Update, UpdateKind, User};

// =============================================================================
// Peers
// =============================================================================

/// A reference to a user or chat as typed by a human.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PeerRef {
    /// Numeric identifier, possibly negative for groups.
    Id(i64),
    /// Username without the leading `@`.
    Username(String),
    /// The bot account itself.
    Me,
}

impl PeerRef {
    /// Parses tokens that unambiguously denote a peer: a numeric id or an
    /// `@username`. Anything else yields `None`.
    pub fn parse_explicit(token: &str) -> Option<Self> {
        if let Ok(id) = token.parse::<i64>() {
            Some(Self::Id(id))
        } else {
            token
                .strip_prefix('@')
                .filter(|name| !name.is_empty())
                .map(|name| Self::Username(name.to_string()))
        }
    }
}

impl FromStr for PeerRef {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("me") || s.eq_ignore_ascii_case("self") {
            return Ok(Self::Me);
        }
        if let Some(peer) = Self::parse_explicit(s) {
            return Ok(peer);
        }
        if s.is_empty() || s.contains(char::is_whitespace) {
            return Err(ApiError::peer_invalid(s));
        }
        Ok(Self::Username(s.to_string()))
    }
}

impl From<i64> for PeerRef {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl fmt::Display for PeerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Username(name) => write!(f, "@{name}"),
            Self::Me => f.write_str("me"),
        }
    }
}

/// What a [`PeerRef`] resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPeer {
    User(User),
    Chat(Chat),
}

// =============================================================================
// Outgoing data
// =============================================================================

/// Status shown to chat members while the bot works.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatAction {
    Typing,
    UploadPhoto,
    RecordVideo,
    UploadVideo,
    RecordAudio,
    UploadAudio,
    UploadDocument,
    FindLocation,
    ChooseSticker,
    Cancel,
}

impl ChatAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Typing => "typing",
            Self::UploadPhoto => "upload_photo",
            Self::RecordVideo => "record_video",
            Self::UploadVideo => "upload_video",
            Self::RecordAudio => "record_audio",
            Self::UploadAudio => "upload_audio",
            Self::UploadDocument => "upload_document",
            Self::FindLocation => "find_location",
            Self::ChooseSticker => "choose_sticker",
            Self::Cancel => "cancel",
        }
    }
}

impl FromStr for ChatAction {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "typing" => Self::Typing,
            "upload_photo" => Self::UploadPhoto,
            "record_video" => Self::RecordVideo,
            "upload_video" => Self::UploadVideo,
            "record_audio" => Self::RecordAudio,
            "upload_audio" => Self::UploadAudio,
            "upload_document" => Self::UploadDocument,
            "find_location" => Self::FindLocation,
            "choose_sticker" => Self::ChooseSticker,
            "cancel" => Self::Cancel,
            other => return Err(ApiError::other(format!("invalid chat action '{other}'"))),
        })
    }
}

/// A message to be sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub media: Option<Media>,
    pub reply_to: Option<MessageId>,
    pub disable_preview: bool,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn reply_to(mut self, message_id: MessageId) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    pub fn media(mut self, media: Media) -> Self {
        self.media = Some(media);
        self
    }
}

// =============================================================================
// Handler registration
// =============================================================================

/// Opaque handle returned by [`ChatClient::add_handler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub u64);

/// Where a handler is attached: which updates it sees and in which group.
///
/// Groups run in ascending order; every group gets a chance at each update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerRoute {
    pub kind: UpdateKind,
    pub group: i32,
}

impl HandlerRoute {
    pub fn new(kind: UpdateKind, group: i32) -> Self {
        Self { kind, group }
    }
}

/// Type-erased update callback installed on the client.
pub type UpdateHandler = Arc<dyn Fn(Update) -> BoxFuture<'static, ()> + Send + Sync>;

// =============================================================================
// ChatClient
// =============================================================================

/// Everything the host consumes from the chat platform.
#[async_trait]
pub trait ChatClient: Send + Sync + 'static {
    /// The bot's own account.
    async fn get_me(&self) -> ApiResult<User>;

    async fn send_message(&self, chat_id: ChatId, message: OutgoingMessage) -> ApiResult<Message>;

    async fn edit_message_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> ApiResult<Message>;

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> ApiResult<()>;

    /// Resolves a user or chat reference.
    async fn resolve_peer(&self, peer: &PeerRef) -> ApiResult<ResolvedPeer>;

    async fn get_chat(&self, peer: &PeerRef) -> ApiResult<Chat>;

    async fn get_chat_member(&self, chat_id: ChatId, user: &PeerRef) -> ApiResult<ChatMember>;

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> ApiResult<()>;

    /// Subscribes `handler` to updates of `route.kind`.
    fn add_handler(&self, route: HandlerRoute, handler: UpdateHandler) -> HandlerId;

    /// Removes a handler previously returned by [`add_handler`](Self::add_handler).
    fn remove_handler(&self, id: HandlerId);
}

/// Shared client handle.
pub type BoxedClient = Arc<dyn ChatClient>;

// =============================================================================
// Flood-wait retry
// =============================================================================

/// Runs `call`, sleeping and retrying when the platform answers with
/// [`ApiError::FloodWait`]. Gives up after `max_retries` retries and returns
/// the last error.
pub async fn retry_flood_wait<T, F, Fut>(max_retries: u32, mut call: F) -> ApiResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Err(ApiError::FloodWait { seconds }) if attempt < max_retries => {
                attempt += 1;
                warn!(seconds, attempt, "Flood wait, sleeping before retry");
                tokio::time::sleep(Duration::from_secs(seconds)).await;
            }
            other => return other,
        }
    }
}
