//! # Pylon
//!
//! A plugin host for chat bots.
//!
//! ## Overview
//!
//! Plugins register commands and event listeners with the host. Incoming
//! platform updates are either routed to a command or fanned out to the
//! listeners of the matching event:
//!
//! ```text
//! ┌──────────┐     ┌───────────────┐     ┌──────────────────────────────┐
//! │  Client  │────▶│ CommandRouter │────▶│ Command (filter, args, call) │──▶ Response
//! │ (updates)│     └───────────────┘     └──────────────────────────────┘
//! │          │     ┌───────────────┐     ┌──────────────────────────────┐
//! │          │────▶│ EventDispatch │────▶│ Listeners (priority order)   │
//! └──────────┘     └───────────────┘     └──────────────────────────────┘
//! ```
//!
//! - **Core** (`pylon-core`): platform models, the `ChatClient` and
//!   `DocumentStore` interfaces
//! - **Framework** (`pylon-framework`): plugins, commands, filters, argument
//!   conversion and dispatch
//! - **Runtime** (`pylon-runtime`): configuration, logging and lifecycle
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pylon::prelude::*;
//!
//! struct Echo;
//!
//! impl Plugin for Echo {
//!     fn commands(self: Arc<Self>) -> Vec<CommandBuilder> {
//!         vec![Command::builder("echo")
//!             .params([Param::rest("text")])
//!             .handler(|_ctx, args| async move { args.get::<String>("text") })]
//!     }
//! }
//!
//! builtin_plugin!(ECHO = PluginDescriptor::new("Echo", |_bot| Arc::new(Echo)));
//!
//! #[tokio::main]
//! async fn main() -> Result<(), RuntimeError> {
//!     let runtime = PylonRuntime::builder(my_client()).build()?;
//!     runtime.run().await
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: read `pylon.toml`
//! - `yaml-config`: read `pylon.yaml` / `pylon.yml`
//! - `json-log`: JSON log lines

pub use pylon_core as core;
pub use pylon_framework as framework;
pub use pylon_runtime as runtime;

pub use pylon_framework::{builtin_plugin, custom_plugin};

/// Commonly used types for writing plugins and starting a host.
///
/// ```rust,ignore
/// use pylon::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Runtime - main entry point
    pub use pylon_runtime::{PylonConfig, PylonRuntime, RuntimeError, RuntimeResult};

    // Plugins
    pub use pylon_framework::plugin::{
        BackupListener, CallbackQueryListener, ChatActionListener, ChatMigrateListener,
        CommandListener, HookResult, InlineQueryListener, LifecycleListener, MessageListener,
        Plugin, PluginDescriptor, Subscription,
    };
    pub use pylon_framework::{builtin_plugin, custom_plugin};

    // Commands
    pub use pylon_framework::{
        Arguments, Bot, Command, CommandBuilder, Context, FromArg, Param, Response,
    };
    pub use pylon_framework::{EventName, EventPayload, ListenerOptions};

    // Filters
    pub use pylon_framework::Filter;
    pub use pylon_framework::filter::builtin::{
        admin_only, can_change_info, can_delete, can_invite, can_pin, can_promote,
        can_restrict, group_chat, owner_only, private_chat, staff_only,
    };

    // Platform types
    pub use pylon_core::{ChatClient, ChatId, Message, User, UserId};

    pub use pylon_framework::BoxError;
    pub use pylon_core::async_trait;
}
