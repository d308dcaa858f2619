//! The host handle shared by every plugin.
//!
//! [`Bot`] is a cheap, cloneable reference to host state: the platform client,
//! the store, texts, settings, the staff set and the bot's own account. Every
//! plugin receives one at construction.
//!
//! The handle reaches the [`EventDispatcher`] only through a `Weak` pointer,
//! so plugins holding a `Bot` never keep the dispatch tables alive.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use pylon_core::{
    ApiError, BoxedClient, BoxedStore, ChatId, Collection, MapTextSource, MemoryStore, Message,
    OutgoingMessage, TextSource, User, UserId, format_text, retry_flood_wait,
};
use tracing::{debug, warn};

use crate::dispatcher::{DispatchMode, EventDispatcher, EventName, EventPayload, PendingTasks};
use crate::error::ResponseError;
use crate::response::{self, MediaEditPolicy, Response, ResponseMode};

/// Host settings the dispatch core consults.
#[derive(Debug, Clone)]
pub struct BotSettings {
    /// Token that marks a message as a command.
    pub command_prefix: String,
    /// Account with full rights. Always part of the staff set.
    pub owner_id: Option<UserId>,
    /// Strings replaced by `[REDACTED]` in responses.
    pub secrets: Vec<String>,
    pub media_edit_policy: MediaEditPolicy,
    /// Retries on flood-wait before a response call gives up.
    pub max_flood_retries: u32,
    /// Language used when a chat has none set.
    pub default_language: String,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            command_prefix: "/".to_string(),
            owner_id: None,
            secrets: Vec::new(),
            media_edit_policy: MediaEditPolicy::default(),
            max_flood_retries: 3,
            default_language: "en".to_string(),
        }
    }
}

struct BotInner {
    client: BoxedClient,
    store: BoxedStore,
    texts: Arc<dyn TextSource>,
    settings: BotSettings,
    me: RwLock<Option<User>>,
    staff: RwLock<HashSet<UserId>>,
    languages: RwLock<HashMap<ChatId, String>>,
    events: Weak<EventDispatcher>,
}

/// Shared handle to the running host.
#[derive(Clone)]
pub struct Bot {
    inner: Arc<BotInner>,
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("me", &*self.inner.me.read())
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl Bot {
    pub fn builder(client: BoxedClient) -> BotBuilder {
        BotBuilder {
            client,
            store: None,
            texts: None,
            settings: BotSettings::default(),
        }
    }

    pub fn client(&self) -> &BoxedClient {
        &self.inner.client
    }

    pub fn store(&self) -> &BoxedStore {
        &self.inner.store
    }

    pub fn settings(&self) -> &BotSettings {
        &self.inner.settings
    }

    /// A named collection in the document store.
    pub fn collection(&self, name: &str) -> Arc<dyn Collection> {
        self.inner.store.collection(name)
    }

    // ─── Identity ────────────────────────────────────────────────────────────

    /// The bot account, once fetched at start-up.
    pub fn me(&self) -> Option<User> {
        self.inner.me.read().clone()
    }

    pub fn set_me(&self, user: User) {
        *self.inner.me.write() = Some(user);
    }

    pub fn username(&self) -> Option<String> {
        self.inner.me.read().as_ref().and_then(|u| u.username.clone())
    }

    pub fn owner(&self) -> Option<UserId> {
        self.inner.settings.owner_id
    }

    // ─── Staff ───────────────────────────────────────────────────────────────

    pub fn is_staff(&self, user: UserId) -> bool {
        self.inner.staff.read().contains(&user)
    }

    pub fn add_staff(&self, user: UserId) -> bool {
        self.inner.staff.write().insert(user)
    }

    pub fn remove_staff(&self, user: UserId) -> bool {
        self.inner.staff.write().remove(&user)
    }

    pub fn staff(&self) -> Vec<UserId> {
        let mut staff: Vec<_> = self.inner.staff.read().iter().copied().collect();
        staff.sort_unstable();
        staff
    }

    // ─── Texts ───────────────────────────────────────────────────────────────

    pub fn chat_language(&self, chat_id: ChatId) -> String {
        self.inner
            .languages
            .read()
            .get(&chat_id)
            .cloned()
            .unwrap_or_else(|| self.inner.settings.default_language.clone())
    }

    pub fn set_chat_language(&self, chat_id: ChatId, lang: impl Into<String>) {
        self.inner.languages.write().insert(chat_id, lang.into());
    }

    /// Resolves `key` in the chat's language, falling back to the default
    /// language, and fills in `args`.
    pub fn text(&self, chat_id: ChatId, key: &str, args: &[&str]) -> String {
        let lang = self.chat_language(chat_id);
        let default = &self.inner.settings.default_language;
        let template = self
            .inner
            .texts
            .template(&lang, key)
            .or_else(|| self.inner.texts.template(default, key));
        match template {
            Some(t) => format_text(&t, args),
            None => format!("NO LANGUAGE STRING FOR '{key}' in '{lang}'"),
        }
    }

    // ─── Events ──────────────────────────────────────────────────────────────

    /// The dispatcher, while the host is alive.
    pub fn events(&self) -> Option<Arc<EventDispatcher>> {
        self.inner.events.upgrade()
    }

    /// Fire-and-forget dispatch. Lifecycle events are awaited in order.
    pub async fn dispatch(&self, event: EventName, payload: EventPayload) {
        self.dispatch_with(event, payload, DispatchMode::Detached)
            .await;
    }

    /// Dispatch returning the scheduled listener tasks.
    pub async fn dispatch_collect(&self, event: EventName, payload: EventPayload) -> PendingTasks {
        self.dispatch_with(event, payload, DispatchMode::Collect)
            .await
    }

    pub async fn dispatch_with(
        &self,
        event: EventName,
        payload: EventPayload,
        mode: DispatchMode,
    ) -> PendingTasks {
        match self.events() {
            Some(events) => events.dispatch_with(&event, payload, mode).await,
            None => {
                debug!(event = %event, "Dispatcher dropped, event discarded");
                PendingTasks::default()
            }
        }
    }

    // ─── Responses ───────────────────────────────────────────────────────────

    /// Replaces the configured secrets in `text`.
    pub fn redact(&self, text: &str) -> String {
        response::redact(text, &self.inner.settings.secrets)
    }

    /// Sends `response` for an invocation triggered by `reference`.
    ///
    /// In [`ResponseMode::Edit`] with a `previous` response, the text is edited
    /// in place; attached media forces a delete of `previous` followed by a new
    /// message, with the delete governed by [`MediaEditPolicy`]. Otherwise a
    /// new reply is sent.
    pub async fn respond(
        &self,
        reference: &Message,
        response: Response,
        previous: Option<&Message>,
    ) -> Result<Message, ResponseError> {
        let text = if response.redact {
            self.redact(&response.text)
        } else {
            response.text
        };
        let text = response::truncate(&text);
        let retries = self.inner.settings.max_flood_retries;
        let client = self.inner.client.clone();

        if let (ResponseMode::Edit, Some(previous)) = (response.mode, previous) {
            if response.media.is_none() {
                let (chat, id) = (previous.chat.id, previous.id);
                let edited = retry_flood_wait(retries, || {
                    let client = client.clone();
                    let text = text.clone();
                    async move { client.edit_message_text(chat, id, &text).await }
                })
                .await?;
                return Ok(edited);
            }

            if let Err(err) = self.delete_message(previous).await {
                match self.inner.settings.media_edit_policy {
                    MediaEditPolicy::Strict => return Err(err.into()),
                    MediaEditPolicy::BestEffort => warn!(
                        message_id = previous.id,
                        error = %err,
                        "Failed to delete previous response before resending media"
                    ),
                }
            }
        }

        let outgoing = OutgoingMessage {
            text,
            media: response.media,
            reply_to: Some(response.reply_to.unwrap_or(reference.id)),
            disable_preview: false,
        };
        let chat = reference.chat.id;
        let sent = retry_flood_wait(retries, || {
            let client = client.clone();
            let outgoing = outgoing.clone();
            async move { client.send_message(chat, outgoing).await }
        })
        .await?;
        Ok(sent)
    }

    /// Deletes `message`, retrying on flood-wait.
    pub async fn delete_message(&self, message: &Message) -> Result<(), ApiError> {
        let client = self.inner.client.clone();
        let (chat, id) = (message.chat.id, message.id);
        retry_flood_wait(self.inner.settings.max_flood_retries, || {
            let client = client.clone();
            async move { client.delete_message(chat, id).await }
        })
        .await
    }
}

/// Builder for [`Bot`].
pub struct BotBuilder {
    client: BoxedClient,
    store: Option<BoxedStore>,
    texts: Option<Arc<dyn TextSource>>,
    settings: BotSettings,
}

impl BotBuilder {
    pub fn store(mut self, store: BoxedStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn texts(mut self, texts: Arc<dyn TextSource>) -> Self {
        self.texts = Some(texts);
        self
    }

    pub fn settings(mut self, settings: BotSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Builds the handle bound to `events`. The owner, if set, starts as staff.
    pub fn build(self, events: &Arc<EventDispatcher>) -> Bot {
        let staff: HashSet<UserId> = self.settings.owner_id.into_iter().collect();
        Bot {
            inner: Arc::new(BotInner {
                client: self.client,
                store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
                texts: self
                    .texts
                    .unwrap_or_else(|| Arc::new(MapTextSource::new())),
                settings: self.settings,
                me: RwLock::new(None),
                staff: RwLock::new(staff),
                languages: RwLock::new(HashMap::new()),
                events: Arc::downgrade(events),
            }),
        }
    }
}
