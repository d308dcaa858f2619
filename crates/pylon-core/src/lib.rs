//! # Pylon Core
//!
//! Platform models and the collaborator interfaces the Pylon host is built
//! against.
//!
//! ## Contents
//!
//! - **Models**: users, chats, members, messages and the [`Update`] enum that
//!   flows through dispatch ([`model`]).
//! - **Chat client**: the [`ChatClient`] trait covering message I/O, peer and
//!   membership lookup, and update handler registration ([`client`]).
//! - **Store**: the [`DocumentStore`] / [`Collection`] traits plus an in-memory
//!   implementation ([`store`]).
//! - **Texts**: the [`TextSource`] lookup and placeholder formatting ([`text`]).
//!
//! Nothing in this crate knows about plugins or commands; that lives in
//! `pylon-framework`.

pub mod client;
pub mod error;
pub mod model;
pub mod store;
pub mod text;

pub use client::{
    BoxedClient, ChatAction, ChatClient, HandlerId, HandlerRoute, OutgoingMessage, PeerRef,
    ResolvedPeer, UpdateHandler, retry_flood_wait,
};
pub use error::{ApiError, ApiResult, StoreError, StoreResult};
pub use model::{
    CallbackQuery, Chat, ChatId, ChatMember, ChatPrivileges, ChatType, EntityKind, InlineQuery,
    InputFile, Media, MemberStatus, Message, MessageEntity, MessageId, Permission, Update,
    UpdateKind, User, UserId,
};
pub use store::{BoxedStore, Collection, Document, DocumentStore, MemoryStore, document};
pub use text::{MapTextSource, TextSource, format_text};

// Re-export for implementors of the async traits.
pub use async_trait::async_trait;
pub use futures::future::BoxFuture;
