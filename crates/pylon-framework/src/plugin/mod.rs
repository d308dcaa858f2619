//! Plugin system.
//!
//! # Architecture
//!
//! A plugin is any type implementing [`Plugin`]. It contributes:
//!
//! - **Commands** through [`Plugin::commands`].
//! - **Listeners for built-in events** by capability: returning `Some(self)`
//!   from an accessor such as [`Plugin::as_message_listener`] subscribes the
//!   matching trait's hook.
//! - **Listeners for any event** through [`Plugin::subscriptions`], or later
//!   through [`PluginManager::register_listener`].
//!
//! A [`PluginDescriptor`] is the static, `Copy` handle to a plugin: a name,
//! some flags and a factory. Descriptors are collected at link time into
//! [`BUILTIN_PLUGINS`] and [`CUSTOM_PLUGINS`] and read through a
//! [`PluginCatalog`].
//!
//! # Quick start
//!
//! ```rust,ignore
//! use pylon::prelude::*;
//!
//! struct Ping;
//!
//! impl Plugin for Ping {
//!     fn commands(self: Arc<Self>) -> Vec<CommandBuilder> {
//!         vec![Command::builder("ping").handler(|_ctx, _args| async { "Pong" })]
//!     }
//! }
//!
//! fn create(_bot: Bot) -> Arc<dyn Plugin> {
//!     Arc::new(Ping)
//! }
//!
//! builtin_plugin!(PING = PluginDescriptor::new("Ping", create).helpable());
//! ```
//!
//! [`PluginManager::register_listener`]: crate::manager::PluginManager::register_listener

mod core;
mod descriptor;
pub mod listener;

pub use self::core::{Plugin, Subscription};
pub(crate) use self::core::capability_listeners;
pub use descriptor::{
    BUILTIN_PLUGINS, CUSTOM_PLUGINS, CatalogSource, PluginCatalog, PluginDescriptor, PluginInfo,
    PluginOrigin,
};
pub use listener::{
    BackupListener, CallbackQueryListener, ChatActionListener, ChatMigrateListener,
    CommandListener, HookResult, InlineQueryListener, LifecycleListener, MessageListener,
};

/// Macro-internal re-export.
#[doc(hidden)]
pub use linkme as __linkme;
