//! Platform data model.
//!
//! These types mirror what a chat-platform client delivers to the host. They
//! are plain data: cloning is cheap enough for the sizes involved, and updates
//! are shared behind `Arc` once they enter dispatch.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Platform user identifier.
pub type UserId = i64;
/// Platform chat identifier.
pub type ChatId = i64;
/// Message identifier, unique within a chat.
pub type MessageId = i64;

// =============================================================================
// Users and chats
// =============================================================================

/// A platform user (human or bot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl User {
    /// Creates a user with only the mandatory fields set.
    pub fn new(id: UserId, first_name: impl Into<String>) -> Self {
        Self {
            id,
            is_bot: false,
            first_name: first_name.into(),
            last_name: None,
            username: None,
        }
    }

    /// Sets the username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Marks the user as a bot account.
    pub fn bot(mut self) -> Self {
        self.is_bot = true;
        self
    }

    /// First and last name joined by a space.
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}

/// Kind of chat an update originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    Private,
    Bot,
    Group,
    Supergroup,
    Channel,
}

/// A chat: private conversation, group, supergroup or channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    #[serde(rename = "type")]
    pub kind: ChatType,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl Chat {
    pub fn new(id: ChatId, kind: ChatType) -> Self {
        Self {
            id,
            kind,
            title: None,
            username: None,
        }
    }

    /// `true` for one-to-one conversations with a user or another bot.
    pub fn is_private(&self) -> bool {
        matches!(self.kind, ChatType::Private | ChatType::Bot)
    }
}

// =============================================================================
// Membership
// =============================================================================

/// Membership status of a user inside a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Banned,
}

/// Administrative capability a filter can ask about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    DeleteMessages,
    ChangeInfo,
    InviteUsers,
    PinMessages,
    PromoteMembers,
    RestrictMembers,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DeleteMessages => "can_delete_messages",
            Self::ChangeInfo => "can_change_info",
            Self::InviteUsers => "can_invite_users",
            Self::PinMessages => "can_pin_messages",
            Self::PromoteMembers => "can_promote_members",
            Self::RestrictMembers => "can_restrict_members",
        };
        f.write_str(name)
    }
}

/// Administrator rights granted to a chat member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatPrivileges {
    pub can_delete_messages: bool,
    pub can_change_info: bool,
    pub can_invite_users: bool,
    pub can_pin_messages: bool,
    pub can_promote_members: bool,
    pub can_restrict_members: bool,
}

impl ChatPrivileges {
    /// Every right granted.
    pub const ALL: Self = Self {
        can_delete_messages: true,
        can_change_info: true,
        can_invite_users: true,
        can_pin_messages: true,
        can_promote_members: true,
        can_restrict_members: true,
    };

    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::DeleteMessages => self.can_delete_messages,
            Permission::ChangeInfo => self.can_change_info,
            Permission::InviteUsers => self.can_invite_users,
            Permission::PinMessages => self.can_pin_messages,
            Permission::PromoteMembers => self.can_promote_members,
            Permission::RestrictMembers => self.can_restrict_members,
        }
    }
}

/// A user's membership record in a specific chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMember {
    pub user: User,
    pub status: MemberStatus,
    #[serde(default)]
    pub privileges: ChatPrivileges,
}

impl ChatMember {
    pub fn new(user: User, status: MemberStatus) -> Self {
        Self {
            user,
            status,
            privileges: ChatPrivileges::default(),
        }
    }

    pub fn with_privileges(mut self, privileges: ChatPrivileges) -> Self {
        self.privileges = privileges;
        self
    }

    /// `true` for the chat creator and administrators.
    pub fn is_admin(&self) -> bool {
        matches!(
            self.status,
            MemberStatus::Creator | MemberStatus::Administrator
        )
    }

    /// Whether the member holds `permission`. The creator holds all of them.
    pub fn can(&self, permission: Permission) -> bool {
        match self.status {
            MemberStatus::Creator => true,
            MemberStatus::Administrator => self.privileges.allows(permission),
            _ => false,
        }
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Formatting entity kinds relevant to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Mention,
    TextMention,
    BotCommand,
    Url,
    Bold,
    Italic,
    Code,
    Other,
}

/// A formatting entity inside a message text.
///
/// `offset` and `length` count characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub offset: usize,
    pub length: usize,
    /// The mentioned user, for [`EntityKind::TextMention`].
    #[serde(default)]
    pub user: Option<User>,
}

impl MessageEntity {
    /// Creates a text mention covering `offset..offset + length`.
    pub fn text_mention(offset: usize, length: usize, user: User) -> Self {
        Self {
            kind: EntityKind::TextMention,
            offset,
            length,
            user: Some(user),
        }
    }
}

/// Source of an outgoing media attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFile {
    FileId(String),
    Url(String),
    Path(std::path::PathBuf),
}

/// Media attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "file", rename_all = "snake_case")]
pub enum Media {
    Animation(InputFile),
    Audio(InputFile),
    Document(InputFile),
    Photo(InputFile),
    Video(InputFile),
}

/// An inbound or sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    /// Text rendered back to markdown, formatting preserved.
    #[serde(default)]
    pub text_markdown: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
    #[serde(default)]
    pub media: Option<Media>,
    /// Set when the message was sent through an inline bot.
    #[serde(default)]
    pub via_bot: Option<User>,
    #[serde(default)]
    pub reply_to_message: Option<Box<Message>>,
    #[serde(default)]
    pub new_chat_members: Vec<User>,
    #[serde(default)]
    pub left_chat_member: Option<User>,
    #[serde(default)]
    pub migrate_from_chat_id: Option<ChatId>,
    #[serde(default)]
    pub migrate_to_chat_id: Option<ChatId>,
}

impl Message {
    /// Creates an empty message in `chat`.
    pub fn new(id: MessageId, chat: Chat) -> Self {
        Self {
            id,
            chat,
            from: None,
            text: None,
            text_markdown: None,
            caption: None,
            entities: Vec::new(),
            media: None,
            via_bot: None,
            reply_to_message: None,
            new_chat_members: Vec::new(),
            left_chat_member: None,
            migrate_from_chat_id: None,
            migrate_to_chat_id: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_markdown(mut self, text: impl Into<String>) -> Self {
        self.text_markdown = Some(text.into());
        self
    }

    pub fn from_user(mut self, user: User) -> Self {
        self.from = Some(user);
        self
    }

    pub fn with_entity(mut self, entity: MessageEntity) -> Self {
        self.entities.push(entity);
        self
    }

    /// Markdown rendering of the text, falling back to the plain text.
    pub fn markdown(&self) -> Option<&str> {
        self.text_markdown.as_deref().or(self.text.as_deref())
    }

    /// The characters covered by `entity`, if the message has text.
    pub fn entity_text(&self, entity: &MessageEntity) -> Option<String> {
        let text = self.text.as_deref()?;
        Some(
            text.chars()
                .skip(entity.offset)
                .take(entity.length)
                .collect(),
        )
    }

    /// How this message is routed to listeners.
    ///
    /// Membership changes become [`UpdateKind::ChatAction`], the first half of
    /// a group migration becomes [`UpdateKind::ChatMigrate`], and the outgoing
    /// half of a migration is not routed at all.
    pub fn kind(&self) -> Option<UpdateKind> {
        if !self.new_chat_members.is_empty() || self.left_chat_member.is_some() {
            Some(UpdateKind::ChatAction)
        } else if self.migrate_from_chat_id.is_some() {
            Some(UpdateKind::ChatMigrate)
        } else if self.migrate_to_chat_id.is_some() {
            None
        } else {
            Some(UpdateKind::Message)
        }
    }
}

/// A button press on an inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

/// A query typed after the bot's username in any chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineQuery {
    pub id: String,
    pub from: User,
    pub query: String,
}

// =============================================================================
// Updates
// =============================================================================

/// Routing category of an inbound update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    Message,
    CallbackQuery,
    InlineQuery,
    ChatAction,
    ChatMigrate,
}

impl UpdateKind {
    pub const ALL: &'static [Self] = &[
        Self::Message,
        Self::CallbackQuery,
        Self::InlineQuery,
        Self::ChatAction,
        Self::ChatMigrate,
    ];
}

/// An inbound platform update, shared across concurrent handlers.
#[derive(Debug, Clone)]
pub enum Update {
    Message(Arc<Message>),
    CallbackQuery(Arc<CallbackQuery>),
    InlineQuery(Arc<InlineQuery>),
}

impl Update {
    pub fn kind(&self) -> Option<UpdateKind> {
        match self {
            Self::Message(m) => m.kind(),
            Self::CallbackQuery(_) => Some(UpdateKind::CallbackQuery),
            Self::InlineQuery(_) => Some(UpdateKind::InlineQuery),
        }
    }

    /// The user who caused the update.
    pub fn sender(&self) -> Option<&User> {
        match self {
            Self::Message(m) => m.from.as_ref(),
            Self::CallbackQuery(q) => Some(&q.from),
            Self::InlineQuery(q) => Some(&q.from),
        }
    }

    /// The chat the update happened in. Inline queries have none.
    pub fn chat(&self) -> Option<&Chat> {
        match self {
            Self::Message(m) => Some(&m.chat),
            Self::CallbackQuery(q) => q.message.as_ref().map(|m| &m.chat),
            Self::InlineQuery(_) => None,
        }
    }

    pub fn message(&self) -> Option<&Arc<Message>> {
        match self {
            Self::Message(m) => Some(m),
            _ => None,
        }
    }
}

impl From<Message> for Update {
    fn from(message: Message) -> Self {
        Self::Message(Arc::new(message))
    }
}

impl From<CallbackQuery> for Update {
    fn from(query: CallbackQuery) -> Self {
        Self::CallbackQuery(Arc::new(query))
    }
}

impl From<InlineQuery> for Update {
    fn from(query: InlineQuery) -> Self {
        Self::InlineQuery(Arc::new(query))
    }
}
