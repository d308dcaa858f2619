//! Capability traits for the built-in events.
//!
//! A plugin opts into an event by implementing the matching trait and
//! returning `Some(self)` from the accessor on [`Plugin`](super::Plugin).
//! Every method has a no-op default where that makes sense, so a plugin only
//! writes the hooks it cares about.

use std::sync::Arc;

use async_trait::async_trait;
use pylon_core::{CallbackQuery, ChatId, InlineQuery, Message};
use serde_json::Value;
use tower::BoxError;

/// Listener result. Errors are logged against the owning plugin.
pub type HookResult = Result<(), BoxError>;

/// Host lifecycle hooks, awaited one plugin after another.
#[async_trait]
pub trait LifecycleListener: Send + Sync {
    async fn on_load(&self) -> HookResult {
        Ok(())
    }

    /// `start_time_us` is the host's start timestamp in microseconds.
    async fn on_start(&self, _start_time_us: u64) -> HookResult {
        Ok(())
    }

    async fn on_started(&self) -> HookResult {
        Ok(())
    }

    async fn on_stop(&self) -> HookResult {
        Ok(())
    }

    async fn on_stopped(&self) -> HookResult {
        Ok(())
    }
}

#[async_trait]
pub trait MessageListener: Send + Sync {
    async fn on_message(&self, message: Arc<Message>) -> HookResult;
}

#[async_trait]
pub trait CallbackQueryListener: Send + Sync {
    async fn on_callback_query(&self, query: Arc<CallbackQuery>) -> HookResult;
}

#[async_trait]
pub trait InlineQueryListener: Send + Sync {
    async fn on_inline_query(&self, query: Arc<InlineQuery>) -> HookResult;
}

/// Members joining or leaving a chat.
#[async_trait]
pub trait ChatActionListener: Send + Sync {
    async fn on_chat_action(&self, message: Arc<Message>) -> HookResult;
}

/// A group upgraded to a supergroup.
#[async_trait]
pub trait ChatMigrateListener: Send + Sync {
    async fn on_chat_migrate(&self, message: Arc<Message>) -> HookResult;
}

/// Runs after every routed command, whichever plugin owned it.
#[async_trait]
pub trait CommandListener: Send + Sync {
    async fn on_command(&self, command: &str, message: Arc<Message>) -> HookResult;
}

/// Per-chat backup and restore of plugin state.
///
/// The data returned by [`on_plugin_backup`](Self::on_plugin_backup) is
/// stored under the plugin's name. On restore the plugin receives only that
/// section, and is not called at all when the backup has none.
#[async_trait]
pub trait BackupListener: Send + Sync {
    /// `None` (or an empty object) when there is nothing to back up.
    async fn on_plugin_backup(&self, chat_id: ChatId) -> Result<Option<Value>, BoxError>;

    async fn on_plugin_restore(&self, chat_id: ChatId, data: Value) -> HookResult;
}
