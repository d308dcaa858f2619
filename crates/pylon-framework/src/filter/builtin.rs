//! Stock filters.
//!
//! `staff_only`, `owner_only` and `admin_only` consult the host and are
//! host-bound. The permission filters only need the client. Every
//! membership-based filter answers `false` in private chats.

use async_trait::async_trait;
use pylon_core::{ChatMember, ChatType, PeerRef, Permission};
use tower::BoxError;

use super::{Filter, FilterScope, Predicate};
use crate::bot::Bot;

// ─── Host-bound ──────────────────────────────────────────────────────────────

struct StaffOnly(Bot);

#[async_trait]
impl Predicate for StaffOnly {
    async fn check(&self, scope: &FilterScope) -> Result<bool, BoxError> {
        Ok(scope.sender().is_some_and(|user| self.0.is_staff(user.id)))
    }
}

struct OwnerOnly(Bot);

#[async_trait]
impl Predicate for OwnerOnly {
    async fn check(&self, scope: &FilterScope) -> Result<bool, BoxError> {
        let owner = self.0.owner();
        Ok(owner.is_some() && scope.sender().map(|user| user.id) == owner)
    }
}

struct AdminOnly(Bot);

#[async_trait]
impl Predicate for AdminOnly {
    async fn check(&self, scope: &FilterScope) -> Result<bool, BoxError> {
        let Some((me, member)) = members(scope).await? else {
            return Ok(false);
        };
        Ok(me.is_admin() && (member.is_admin() || self.0.is_staff(member.user.id)))
    }
}

/// Passes for members of the staff set.
pub fn staff_only() -> Filter {
    Filter::host_bound("staff_only", |bot: &Bot| StaffOnly(bot.clone()))
}

/// Passes for the configured owner only.
pub fn owner_only() -> Filter {
    Filter::host_bound("owner_only", |bot: &Bot| OwnerOnly(bot.clone()))
}

/// Passes in groups where the bot is an administrator and the sender is an
/// administrator or staff.
pub fn admin_only() -> Filter {
    Filter::host_bound("admin_only", |bot: &Bot| AdminOnly(bot.clone()))
}

// ─── Permissions ─────────────────────────────────────────────────────────────

/// Fetches the bot's and the sender's membership of the scope's chat.
/// `None` in private chats or when there is no sender.
async fn members(scope: &FilterScope) -> Result<Option<(ChatMember, ChatMember)>, BoxError> {
    let (Some(chat), Some(sender)) = (scope.chat(), scope.sender()) else {
        return Ok(None);
    };
    if chat.is_private() {
        return Ok(None);
    }
    let (chat_id, user_id) = (chat.id, sender.id);
    let me = scope.member(chat_id, PeerRef::Me).await?;
    let member = scope.member(chat_id, PeerRef::Id(user_id)).await?;
    Ok(Some((me, member)))
}

struct HasPermission(Permission);

#[async_trait]
impl Predicate for HasPermission {
    async fn check(&self, scope: &FilterScope) -> Result<bool, BoxError> {
        Ok(members(scope)
            .await?
            .is_some_and(|(me, member)| me.can(self.0) && member.can(self.0)))
    }
}

/// Passes when both the bot and the sender hold `permission` in the chat.
pub fn has_permission(permission: Permission) -> Filter {
    Filter::leaf(permission.to_string(), HasPermission(permission))
}

pub fn can_delete() -> Filter {
    has_permission(Permission::DeleteMessages)
}

pub fn can_change_info() -> Filter {
    has_permission(Permission::ChangeInfo)
}

pub fn can_invite() -> Filter {
    has_permission(Permission::InviteUsers)
}

pub fn can_pin() -> Filter {
    has_permission(Permission::PinMessages)
}

pub fn can_promote() -> Filter {
    has_permission(Permission::PromoteMembers)
}

pub fn can_restrict() -> Filter {
    has_permission(Permission::RestrictMembers)
}

// ─── Chat type ───────────────────────────────────────────────────────────────

pub fn private_chat() -> Filter {
    Filter::from_fn("private_chat", |scope: FilterScope| async move {
        Ok(scope.chat().is_some_and(|chat| chat.is_private()))
    })
}

pub fn group_chat() -> Filter {
    Filter::from_fn("group_chat", |scope: FilterScope| async move {
        Ok(scope
            .chat()
            .is_some_and(|chat| matches!(chat.kind, ChatType::Group | ChatType::Supergroup)))
    })
}
