//! Recording client and fixtures for unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use pylon_core::{
    ApiError, ApiResult, Chat, ChatAction, ChatClient, ChatId, ChatMember, ChatType, HandlerId,
    HandlerRoute, MemberStatus, Message, MessageId, OutgoingMessage, PeerRef, ResolvedPeer, Update,
    UpdateHandler, User,
};

pub(crate) const GROUP_ID: ChatId = -100;
pub(crate) const BOT_ID: i64 = 1_000;
pub(crate) const BOT_USERNAME: &str = "pylon_bot";

pub(crate) fn user(id: i64) -> User {
    User::new(id, format!("User {id}")).with_username(format!("user{id}"))
}

pub(crate) fn group_chat() -> Chat {
    Chat::new(GROUP_ID, ChatType::Supergroup)
}

pub(crate) fn private_chat(id: i64) -> Chat {
    Chat::new(id, ChatType::Private)
}

pub(crate) fn bot_user() -> User {
    User::new(BOT_ID, "Pylon").with_username(BOT_USERNAME).bot()
}

/// A [`ChatClient`] that records every call and answers from fixtures.
#[derive(Default)]
pub(crate) struct MockClient {
    next_id: AtomicI64,
    next_handler: AtomicU64,
    sent: Mutex<Vec<(ChatId, OutgoingMessage)>>,
    texts: Mutex<HashMap<(ChatId, MessageId), String>>,
    edits: Mutex<Vec<(ChatId, MessageId, String)>>,
    deleted: Mutex<Vec<(ChatId, MessageId)>>,
    actions: Mutex<Vec<(ChatId, ChatAction)>>,
    fail_deletes: AtomicBool,
    lookup_failure: Mutex<Option<ApiError>>,
    peers: Mutex<HashMap<PeerRef, ResolvedPeer>>,
    members: Mutex<HashMap<(ChatId, PeerRef), ChatMember>>,
    member_calls: AtomicUsize,
    handlers: Mutex<Vec<(HandlerId, HandlerRoute, UpdateHandler)>>,
}

impl MockClient {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicI64::new(500),
            ..Default::default()
        })
    }

    pub(crate) fn sent(&self) -> Vec<(ChatId, OutgoingMessage)> {
        self.sent.lock().clone()
    }

    pub(crate) fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, m)| m.text.clone()).collect()
    }

    pub(crate) fn edits(&self) -> Vec<(ChatId, MessageId, String)> {
        self.edits.lock().clone()
    }

    pub(crate) fn deleted(&self) -> Vec<(ChatId, MessageId)> {
        self.deleted.lock().clone()
    }

    pub(crate) fn actions(&self) -> Vec<(ChatId, ChatAction)> {
        self.actions.lock().clone()
    }

    pub(crate) fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    /// Makes every peer lookup fail with `err`.
    pub(crate) fn fail_lookups(&self, err: ApiError) {
        *self.lookup_failure.lock() = Some(err);
    }

    pub(crate) fn add_peer(&self, peer: PeerRef, resolved: ResolvedPeer) {
        self.peers.lock().insert(peer, resolved);
    }

    pub(crate) fn set_member(&self, chat_id: ChatId, peer: PeerRef, member: ChatMember) {
        self.members.lock().insert((chat_id, peer), member);
    }

    pub(crate) fn member_calls(&self) -> usize {
        self.member_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    pub(crate) fn handler_groups(&self) -> Vec<i32> {
        self.handlers.lock().iter().map(|(_, r, _)| r.group).collect()
    }

    /// Feeds `update` to every matching handler, lowest group first.
    pub(crate) async fn emit(&self, update: Update) {
        let Some(kind) = update.kind() else {
            return;
        };
        let mut matching: Vec<_> = self
            .handlers
            .lock()
            .iter()
            .filter(|(_, route, _)| route.kind == kind)
            .map(|(_, route, handler)| (route.group, handler.clone()))
            .collect();
        matching.sort_by_key(|(group, _)| *group);
        for (_, handler) in matching {
            handler(update.clone()).await;
        }
    }

    fn resolve(&self, peer: &PeerRef) -> ApiResult<ResolvedPeer> {
        if let Some(err) = self.lookup_failure.lock().clone() {
            return Err(err);
        }
        if let Some(found) = self.peers.lock().get(peer) {
            return Ok(found.clone());
        }
        match peer {
            PeerRef::Me => Ok(ResolvedPeer::User(bot_user())),
            PeerRef::Id(id) if *id > 0 => Ok(ResolvedPeer::User(user(*id))),
            PeerRef::Id(id) => Ok(ResolvedPeer::Chat(Chat::new(*id, ChatType::Supergroup))),
            PeerRef::Username(name) => Err(ApiError::peer_invalid(name.as_str())),
        }
    }
}

#[async_trait]
impl ChatClient for MockClient {
    async fn get_me(&self) -> ApiResult<User> {
        Ok(bot_user())
    }

    async fn send_message(&self, chat_id: ChatId, message: OutgoingMessage) -> ApiResult<Message> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().insert((chat_id, id), message.text.clone());
        let sent = Message::new(id, Chat::new(chat_id, ChatType::Supergroup))
            .from_user(bot_user())
            .with_text(message.text.clone());
        self.sent.lock().push((chat_id, message));
        Ok(sent)
    }

    async fn edit_message_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> ApiResult<Message> {
        let previous = self.texts.lock().insert((chat_id, message_id), text.to_string());
        if previous.as_deref() == Some(text) {
            return Err(ApiError::MessageNotModified);
        }
        self.edits
            .lock()
            .push((chat_id, message_id, text.to_string()));
        Ok(Message::new(message_id, Chat::new(chat_id, ChatType::Supergroup))
            .from_user(bot_user())
            .with_text(text))
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> ApiResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ApiError::Forbidden("message can't be deleted".into()));
        }
        self.deleted.lock().push((chat_id, message_id));
        Ok(())
    }

    async fn resolve_peer(&self, peer: &PeerRef) -> ApiResult<ResolvedPeer> {
        self.resolve(peer)
    }

    async fn get_chat(&self, peer: &PeerRef) -> ApiResult<Chat> {
        match self.resolve(peer)? {
            ResolvedPeer::Chat(chat) => Ok(chat),
            ResolvedPeer::User(user) => Ok(Chat::new(user.id, ChatType::Private)),
        }
    }

    async fn get_chat_member(&self, chat_id: ChatId, user: &PeerRef) -> ApiResult<ChatMember> {
        self.member_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(member) = self.members.lock().get(&(chat_id, user.clone())) {
            return Ok(member.clone());
        }
        match self.resolve(user)? {
            ResolvedPeer::User(user) => Ok(ChatMember::new(user, MemberStatus::Member)),
            ResolvedPeer::Chat(chat) => Err(ApiError::peer_invalid(chat.id.to_string())),
        }
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> ApiResult<()> {
        self.actions.lock().push((chat_id, action));
        Ok(())
    }

    fn add_handler(&self, route: HandlerRoute, handler: UpdateHandler) -> HandlerId {
        let id = HandlerId(self.next_handler.fetch_add(1, Ordering::SeqCst));
        self.handlers.lock().push((id, route, handler));
        id
    }

    fn remove_handler(&self, id: HandlerId) {
        self.handlers.lock().retain(|(h, _, _)| *h != id);
    }
}
