//! # Pylon Framework
//!
//! The dispatch engine of the Pylon bot host.
//!
//! This layer provides:
//! - [`Bot`]: the host handle every plugin receives
//! - [`PluginManager`]: plugin loading, the command table and listener registration
//! - [`EventDispatcher`]: named events, priorities, filters and platform subscriptions
//! - [`CommandRouter`]: command recognition, argument conversion and invocation
//! - [`Filter`]: composable permission and chat filters
//! - [`Context`] and [`Response`]: what a command handler works with
//!
//! Platform models and the client and store interfaces live in `pylon-core`;
//! configuration, logging and the process lifecycle in `pylon-runtime`.

pub mod bot;
pub mod command;
pub mod context;
pub mod convert;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod manager;
pub mod plugin;
pub mod response;
pub mod router;

#[cfg(test)]
mod testing;

pub use bot::{Bot, BotBuilder, BotSettings};
pub use command::{Command, CommandBuilder, CommandHandler, IntoReply, Invocation};
pub use context::{ChatActionGuard, Context};
pub use convert::{Arg, Arguments, Conversion, EntityType, FromArg, Param, ParamKind};
pub use dispatcher::{
    DEFAULT_PRIORITY, DispatchMode, EventDispatcher, EventName, EventPayload, Listener,
    ListenerHandler, ListenerOptions, ListenerResult, PendingTasks, listener_fn,
};
pub use error::{ArgumentError, CommandError, PluginError, PluginResult, ResponseError};
pub use filter::{Filter, FilterScope, Predicate, PredicateFn};
pub use manager::PluginManager;
pub use plugin::{
    BackupListener, CallbackQueryListener, ChatActionListener, ChatMigrateListener,
    CommandListener, HookResult, InlineQueryListener, LifecycleListener, MessageListener, Plugin,
    PluginCatalog, PluginDescriptor, PluginInfo, PluginOrigin, Subscription,
};
pub use response::{MediaEditPolicy, Response, ResponseMode};
pub use router::{CommandRouter, Recognized, RouteOutcome};

pub use tower::BoxError;
