//! The [`Plugin`] trait and the bridge from its capabilities to listeners.

use std::future::Future;
use std::sync::Arc;

use pylon_core::Update;
use serde_json::{Map, Value};

use super::listener::{
    BackupListener, CallbackQueryListener, ChatActionListener, ChatMigrateListener,
    CommandListener, InlineQueryListener, LifecycleListener, MessageListener,
};
use crate::command::CommandBuilder;
use crate::dispatcher::{
    EventName, EventPayload, ListenerHandler, ListenerOptions, ListenerResult, listener_fn,
};

// =============================================================================
// Plugin
// =============================================================================

/// A live plugin.
///
/// Everything has a default, so the smallest plugin is an empty `impl`.
/// Methods taking `self: Arc<Self>` let handlers and listeners keep the
/// plugin alive for as long as they are registered.
///
/// ```rust,ignore
/// struct Greeter { bot: Bot }
///
/// impl Plugin for Greeter {
///     fn commands(self: Arc<Self>) -> Vec<CommandBuilder> {
///         vec![Command::builder("hello").handler(|_ctx, _args| async { "Hello!" })]
///     }
///
///     fn as_message_listener(self: Arc<Self>) -> Option<Arc<dyn MessageListener>> {
///         Some(self)
///     }
/// }
/// ```
pub trait Plugin: Send + Sync + 'static {
    /// Commands registered when the plugin loads.
    fn commands(self: Arc<Self>) -> Vec<CommandBuilder> {
        Vec::new()
    }

    /// Extra listeners, usually for custom events.
    fn subscriptions(self: Arc<Self>) -> Vec<Subscription> {
        Vec::new()
    }

    /// Priority and filter of the listener registered for `event`.
    fn listener_options(&self, _event: &EventName) -> ListenerOptions {
        ListenerOptions::default()
    }

    // ─── Capabilities ────────────────────────────────────────────────────────

    fn as_lifecycle_listener(self: Arc<Self>) -> Option<Arc<dyn LifecycleListener>> {
        None
    }

    fn as_message_listener(self: Arc<Self>) -> Option<Arc<dyn MessageListener>> {
        None
    }

    fn as_callback_query_listener(self: Arc<Self>) -> Option<Arc<dyn CallbackQueryListener>> {
        None
    }

    fn as_inline_query_listener(self: Arc<Self>) -> Option<Arc<dyn InlineQueryListener>> {
        None
    }

    fn as_chat_action_listener(self: Arc<Self>) -> Option<Arc<dyn ChatActionListener>> {
        None
    }

    fn as_chat_migrate_listener(self: Arc<Self>) -> Option<Arc<dyn ChatMigrateListener>> {
        None
    }

    fn as_command_listener(self: Arc<Self>) -> Option<Arc<dyn CommandListener>> {
        None
    }

    fn as_backup_listener(self: Arc<Self>) -> Option<Arc<dyn BackupListener>> {
        None
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// A listener a plugin registers by event name.
pub struct Subscription {
    pub(crate) event: EventName,
    pub(crate) handler: ListenerHandler,
    pub(crate) options: Option<ListenerOptions>,
}

impl Subscription {
    pub fn new(event: impl Into<EventName>, handler: ListenerHandler) -> Self {
        Self {
            event: event.into(),
            handler,
            options: None,
        }
    }

    /// Subscribes an async closure to `event`.
    pub fn on<F, Fut>(event: impl Into<EventName>, f: F) -> Self
    where
        F: Fn(EventPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ListenerResult> + Send + 'static,
    {
        Self::new(event, listener_fn(f))
    }

    /// Overrides [`Plugin::listener_options`] for this subscription.
    pub fn options(mut self, options: ListenerOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn event(&self) -> &EventName {
        &self.event
    }
}

// =============================================================================
// Capability bridge
// =============================================================================

/// The listener handlers implied by `plugin`'s capabilities.
pub(crate) fn capability_listeners(
    plugin: &Arc<dyn Plugin>,
    name: &Arc<str>,
) -> Vec<(EventName, ListenerHandler)> {
    let mut listeners = Vec::new();

    if let Some(hooks) = plugin.clone().as_lifecycle_listener() {
        for event in EventName::LIFECYCLE {
            listeners.push((event.clone(), lifecycle_handler(hooks.clone(), event.clone())));
        }
    }

    if let Some(listener) = plugin.clone().as_message_listener() {
        listeners.push((
            EventName::Message,
            listener_fn(move |payload| {
                let listener = listener.clone();
                async move {
                    if let Some(Update::Message(message)) = payload.update() {
                        listener.on_message(message).await?;
                    }
                    Ok(None)
                }
            }),
        ));
    }

    if let Some(listener) = plugin.clone().as_callback_query_listener() {
        listeners.push((
            EventName::CallbackQuery,
            listener_fn(move |payload| {
                let listener = listener.clone();
                async move {
                    if let Some(Update::CallbackQuery(query)) = payload.update() {
                        listener.on_callback_query(query).await?;
                    }
                    Ok(None)
                }
            }),
        ));
    }

    if let Some(listener) = plugin.clone().as_inline_query_listener() {
        listeners.push((
            EventName::InlineQuery,
            listener_fn(move |payload| {
                let listener = listener.clone();
                async move {
                    if let Some(Update::InlineQuery(query)) = payload.update() {
                        listener.on_inline_query(query).await?;
                    }
                    Ok(None)
                }
            }),
        ));
    }

    if let Some(listener) = plugin.clone().as_chat_action_listener() {
        listeners.push((
            EventName::ChatAction,
            listener_fn(move |payload| {
                let listener = listener.clone();
                async move {
                    if let Some(Update::Message(message)) = payload.update() {
                        listener.on_chat_action(message).await?;
                    }
                    Ok(None)
                }
            }),
        ));
    }

    if let Some(listener) = plugin.clone().as_chat_migrate_listener() {
        listeners.push((
            EventName::ChatMigrate,
            listener_fn(move |payload| {
                let listener = listener.clone();
                async move {
                    if let Some(Update::Message(message)) = payload.update() {
                        listener.on_chat_migrate(message).await?;
                    }
                    Ok(None)
                }
            }),
        ));
    }

    if let Some(listener) = plugin.clone().as_command_listener() {
        listeners.push((
            EventName::Command,
            listener_fn(move |payload| {
                let listener = listener.clone();
                async move {
                    if let EventPayload::Command { name, message } = payload {
                        listener.on_command(&name, message).await?;
                    }
                    Ok(None)
                }
            }),
        ));
    }

    if let Some(listener) = plugin.clone().as_backup_listener() {
        let backup = listener.clone();
        let section = name.clone();
        listeners.push((
            EventName::PluginBackup,
            listener_fn(move |payload| {
                let backup = backup.clone();
                let section = section.clone();
                async move {
                    let EventPayload::Backup { chat_id } = payload else {
                        return Ok(None);
                    };
                    Ok(backup
                        .on_plugin_backup(chat_id)
                        .await?
                        .filter(has_content)
                        .map(|data| Value::Object(Map::from_iter([(section.to_string(), data)]))))
                }
            }),
        ));

        let section = name.clone();
        listeners.push((
            EventName::PluginRestore,
            listener_fn(move |payload| {
                let restore = listener.clone();
                let section = section.clone();
                async move {
                    if let EventPayload::Restore { chat_id, data } = payload
                        && let Some(own) = data.get(&*section)
                    {
                        restore.on_plugin_restore(chat_id, own.clone()).await?;
                    }
                    Ok(None)
                }
            }),
        ));
    }

    listeners
}

fn lifecycle_handler(hooks: Arc<dyn LifecycleListener>, event: EventName) -> ListenerHandler {
    listener_fn(move |payload| {
        let hooks = hooks.clone();
        let event = event.clone();
        async move {
            match event {
                EventName::Load => hooks.on_load().await?,
                EventName::Start => {
                    let start_time_us = match payload {
                        EventPayload::Start { start_time_us } => start_time_us,
                        _ => 0,
                    };
                    hooks.on_start(start_time_us).await?
                }
                EventName::Started => hooks.on_started().await?,
                EventName::Stop => hooks.on_stop().await?,
                EventName::Stopped => hooks.on_stopped().await?,
                _ => {}
            }
            Ok(None)
        }
    })
}

fn has_content(data: &Value) -> bool {
    match data {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}
