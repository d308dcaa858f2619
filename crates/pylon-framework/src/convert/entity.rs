//! Converters for users, chats and chat members.
//!
//! User and member lookups accept a numeric id or an `@username`. Any other
//! token is matched against the text mentions of the invoking message; when
//! nothing matches the value is [`Arg::None`].

use std::num::ParseIntError;

use async_trait::async_trait;
use pylon_core::{EntityKind, Message, PeerRef, ResolvedPeer, User};

use super::Converter;
use super::value::Arg;
use crate::context::Context;
use crate::error::ArgumentError;

/// `digits` or `@name`. Negative ids denote chats, not users.
///
/// A digit run that does not fit an id is an error rather than free text.
fn user_ref(token: &str) -> Result<Option<PeerRef>, ParseIntError> {
    let numeric = !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit());
    if numeric {
        token.parse().map(|id| Some(PeerRef::Id(id)))
    } else if token.starts_with('@') {
        Ok(PeerRef::parse_explicit(token))
    } else {
        Ok(None)
    }
}

/// The user of the first text mention whose text equals `token`.
fn mentioned_user(message: &Message, token: &str) -> Option<User> {
    message
        .entities
        .iter()
        .filter(|entity| entity.kind == EntityKind::TextMention)
        .find(|entity| message.entity_text(entity).as_deref() == Some(token))
        .and_then(|entity| entity.user.clone())
}

pub struct UserConverter;

#[async_trait]
impl Converter for UserConverter {
    fn name(&self) -> &'static str {
        "UserConverter"
    }

    async fn convert(&self, ctx: &Context, token: &str) -> Result<Arg, ArgumentError> {
        let peer = user_ref(token).map_err(|e| ArgumentError::conversion(self.name(), e))?;
        let Some(peer) = peer else {
            return Ok(mentioned_user(ctx.message(), token).into());
        };
        match ctx.bot().client().resolve_peer(&peer).await {
            Ok(ResolvedPeer::User(user)) => Ok(Arg::User(user)),
            Ok(ResolvedPeer::Chat(chat)) => Err(ArgumentError::bad_result(
                self.name(),
                format!("'{token}' resolved to chat {} instead of a user", chat.id),
            )),
            Err(e) => Err(ArgumentError::from_api(self.name(), e)),
        }
    }
}

pub struct ChatConverter;

#[async_trait]
impl Converter for ChatConverter {
    fn name(&self) -> &'static str {
        "ChatConverter"
    }

    async fn convert(&self, ctx: &Context, token: &str) -> Result<Arg, ArgumentError> {
        let peer: PeerRef = token
            .parse()
            .map_err(|e| ArgumentError::from_api(self.name(), e))?;
        ctx.bot()
            .client()
            .get_chat(&peer)
            .await
            .map(Arg::Chat)
            .map_err(|e| ArgumentError::from_api(self.name(), e))
    }
}

pub struct ChatMemberConverter;

#[async_trait]
impl Converter for ChatMemberConverter {
    fn name(&self) -> &'static str {
        "ChatMemberConverter"
    }

    async fn convert(&self, ctx: &Context, token: &str) -> Result<Arg, ArgumentError> {
        let peer = user_ref(token).map_err(|e| ArgumentError::conversion(self.name(), e))?;
        let peer = match peer {
            Some(peer) => peer,
            None => match mentioned_user(ctx.message(), token) {
                Some(user) => PeerRef::Id(user.id),
                None => return Ok(Arg::None),
            },
        };
        ctx.bot()
            .client()
            .get_chat_member(ctx.chat().id, &peer)
            .await
            .map(Arg::Member)
            .map_err(|e| ArgumentError::from_api(self.name(), e))
    }
}
