//! Named-event dispatch to plugin listeners.
//!
//! [`EventDispatcher`] owns the listener table: for every [`EventName`] an
//! ordered list of [`Listener`]s (ascending priority, registration order among
//! equals). It is used in two ways:
//!
//! - **Detached** (default): one task per permitted listener is spawned and
//!   dispatch returns as soon as they are scheduled. Lifecycle events
//!   (`load`, `start`, `started`, `stop`, `stopped`) are the exception: their
//!   listeners are awaited one after another before dispatch returns.
//! - **Collect**: the spawned tasks are handed back as [`PendingTasks`]; the
//!   caller awaits them and interprets each result. Backup and restore flows
//!   use this to aggregate per-plugin data.
//!
//! # Platform subscriptions
//!
//! Platform events (`message`, `callback_query`, `inline_query`,
//! `chat_action`, `chat_migrate`) are only subscribed on the [`ChatClient`]
//! while at least one listener exists for them. Every table change re-runs
//! that reconciliation, installing or removing the forwarding handler.
//!
//! [`ChatClient`]: pylon_core::ChatClient

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use parking_lot::{Mutex, RwLock};
use pylon_core::{
    BoxedClient, ChatId, HandlerId, HandlerRoute, Message, Update, UpdateHandler, UpdateKind,
};
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tower::BoxError;
use tracing::{Instrument, debug, error, info_span, trace, warn};

use crate::filter::{Filter, FilterScope};

/// Client handler group used for listener forwarding.
pub const LISTENER_GROUP: i32 = 0;

/// Priority given to listeners that don't ask for one.
pub const DEFAULT_PRIORITY: i32 = 100;

// =============================================================================
// EventName
// =============================================================================

/// Name of a dispatchable event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventName {
    Load,
    Start,
    Started,
    Stop,
    Stopped,
    Message,
    CallbackQuery,
    InlineQuery,
    ChatAction,
    ChatMigrate,
    /// Fired after every routed command.
    Command,
    PluginBackup,
    PluginRestore,
    Custom(Cow<'static, str>),
}

impl EventName {
    /// Events whose listeners are awaited in order on detached dispatch.
    pub const LIFECYCLE: &'static [Self] = &[
        Self::Load,
        Self::Start,
        Self::Started,
        Self::Stop,
        Self::Stopped,
    ];

    pub fn custom(name: impl Into<Cow<'static, str>>) -> Self {
        let name = name.into();
        Self::from(&*name)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Load => "load",
            Self::Start => "start",
            Self::Started => "started",
            Self::Stop => "stop",
            Self::Stopped => "stopped",
            Self::Message => "message",
            Self::CallbackQuery => "callback_query",
            Self::InlineQuery => "inline_query",
            Self::ChatAction => "chat_action",
            Self::ChatMigrate => "chat_migrate",
            Self::Command => "command",
            Self::PluginBackup => "plugin_backup",
            Self::PluginRestore => "plugin_restore",
            Self::Custom(name) => name,
        }
    }

    /// Conventional handler name, e.g. `on_message`.
    pub fn handler_name(&self) -> String {
        format!("on_{}", self.as_str())
    }

    pub fn is_lifecycle(&self) -> bool {
        Self::LIFECYCLE.contains(self)
    }

    /// The platform update kind this event subscribes to, if any.
    pub fn update_kind(&self) -> Option<UpdateKind> {
        match self {
            Self::Message => Some(UpdateKind::Message),
            Self::CallbackQuery => Some(UpdateKind::CallbackQuery),
            Self::InlineQuery => Some(UpdateKind::InlineQuery),
            Self::ChatAction => Some(UpdateKind::ChatAction),
            Self::ChatMigrate => Some(UpdateKind::ChatMigrate),
            _ => None,
        }
    }
}

impl From<UpdateKind> for EventName {
    fn from(kind: UpdateKind) -> Self {
        match kind {
            UpdateKind::Message => Self::Message,
            UpdateKind::CallbackQuery => Self::CallbackQuery,
            UpdateKind::InlineQuery => Self::InlineQuery,
            UpdateKind::ChatAction => Self::ChatAction,
            UpdateKind::ChatMigrate => Self::ChatMigrate,
        }
    }
}

impl From<&str> for EventName {
    fn from(name: &str) -> Self {
        match name {
            "load" => Self::Load,
            "start" => Self::Start,
            "started" => Self::Started,
            "stop" => Self::Stop,
            "stopped" => Self::Stopped,
            "message" => Self::Message,
            "callback_query" => Self::CallbackQuery,
            "inline_query" => Self::InlineQuery,
            "chat_action" => Self::ChatAction,
            "chat_migrate" => Self::ChatMigrate,
            "command" => Self::Command,
            "plugin_backup" => Self::PluginBackup,
            "plugin_restore" => Self::PluginRestore,
            other => Self::Custom(Cow::Owned(other.to_string())),
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// EventPayload
// =============================================================================

/// Data carried by a dispatched event.
#[derive(Debug, Clone)]
pub enum EventPayload {
    None,
    Start { start_time_us: u64 },
    Update(Update),
    Command { name: String, message: Arc<Message> },
    Backup { chat_id: ChatId },
    Restore { chat_id: ChatId, data: Arc<Value> },
    Custom(Arc<Value>),
}

impl EventPayload {
    /// The platform update listener filters are evaluated against.
    pub fn update(&self) -> Option<Update> {
        match self {
            Self::Update(update) => Some(update.clone()),
            Self::Command { message, .. } => Some(Update::Message(message.clone())),
            _ => None,
        }
    }
}

// =============================================================================
// Listeners
// =============================================================================

/// What a listener task yields: an optional value for collect-mode callers.
pub type ListenerResult = Result<Option<Value>, BoxError>;

/// Type-erased listener body.
pub type ListenerHandler =
    Arc<dyn Fn(EventPayload) -> BoxFuture<'static, ListenerResult> + Send + Sync>;

/// Wraps an async closure into a [`ListenerHandler`].
pub fn listener_fn<F, Fut>(f: F) -> ListenerHandler
where
    F: Fn(EventPayload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ListenerResult> + Send + 'static,
{
    Arc::new(move |payload| f(payload).boxed())
}

/// Per-listener settings.
#[derive(Clone)]
pub struct ListenerOptions {
    /// Lower runs first.
    pub priority: i32,
    /// Only evaluated for payloads carrying an update.
    pub filter: Option<Filter>,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            filter: None,
        }
    }
}

impl ListenerOptions {
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// A registered listener.
#[derive(Clone)]
pub struct Listener {
    pub plugin: Arc<str>,
    pub event: EventName,
    pub priority: i32,
    pub filter: Option<Filter>,
    pub handler: ListenerHandler,
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("plugin", &self.plugin)
            .field("event", &self.event)
            .field("priority", &self.priority)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

// =============================================================================
// PendingTasks
// =============================================================================

/// How [`EventDispatcher::dispatch_with`] treats the spawned tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchMode {
    #[default]
    Detached,
    Collect,
}

/// Listener tasks scheduled by a collect-mode dispatch.
#[derive(Default)]
pub struct PendingTasks {
    tasks: Vec<(Arc<str>, JoinHandle<ListenerResult>)>,
}

impl PendingTasks {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Names of the plugins owning the scheduled tasks.
    pub fn plugins(&self) -> Vec<&str> {
        self.tasks.iter().map(|(p, _)| p.as_ref()).collect()
    }

    pub fn into_inner(self) -> Vec<(Arc<str>, JoinHandle<ListenerResult>)> {
        self.tasks
    }

    /// Awaits every task. Panics and cancellations are reported as errors.
    pub async fn join_all(self) -> Vec<(Arc<str>, ListenerResult)> {
        let (plugins, handles): (Vec<_>, Vec<_>) = self.tasks.into_iter().unzip();
        let results = future::join_all(handles).await;
        plugins
            .into_iter()
            .zip(results)
            .map(|(plugin, joined)| {
                let result = joined.unwrap_or_else(|e| Err(Box::new(e) as BoxError));
                (plugin, result)
            })
            .collect()
    }

    /// Awaits every task and merges the JSON objects they returned.
    ///
    /// Tasks returning nothing, an empty object or a non-object value
    /// contribute nothing. Failed tasks are logged and skipped.
    pub async fn merge_objects(self) -> Map<String, Value> {
        let mut merged = Map::new();
        for (plugin, result) in self.join_all().await {
            match result {
                Ok(Some(Value::Object(map))) => merged.extend(map),
                Ok(Some(Value::Null) | None) => {}
                Ok(Some(other)) => {
                    warn!(plugin = %plugin, value = %other, "Listener returned a non-object value");
                }
                Err(e) => error!(plugin = %plugin, error = %e, "Listener task failed"),
            }
        }
        merged
    }
}

// =============================================================================
// EventDispatcher
// =============================================================================

/// Listener table plus dispatch.
pub struct EventDispatcher {
    client: BoxedClient,
    listeners: RwLock<HashMap<EventName, Vec<Listener>>>,
    installed: Mutex<HashMap<UpdateKind, HandlerId>>,
    weak: Weak<Self>,
}

impl EventDispatcher {
    pub fn new(client: BoxedClient) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            client,
            listeners: RwLock::new(HashMap::new()),
            installed: Mutex::new(HashMap::new()),
            weak: weak.clone(),
        })
    }

    pub fn client(&self) -> &BoxedClient {
        &self.client
    }

    // ─── Table management ────────────────────────────────────────────────────

    /// Inserts `listener` after every listener with a lower or equal priority.
    pub fn add_listener(&self, listener: Listener) {
        debug!(
            plugin = %listener.plugin,
            event = %listener.event,
            priority = listener.priority,
            "Listener registered"
        );
        {
            let mut table = self.listeners.write();
            let list = table.entry(listener.event.clone()).or_default();
            let pos = list.partition_point(|l| l.priority <= listener.priority);
            list.insert(pos, listener);
        }
        self.reconcile_subscriptions();
    }

    /// Removes every listener owned by `plugin`. Returns how many were removed.
    pub fn remove_plugin(&self, plugin: &str) -> usize {
        let removed = {
            let mut table = self.listeners.write();
            let mut removed = 0;
            table.retain(|_, list| {
                let before = list.len();
                list.retain(|l| l.plugin.as_ref() != plugin);
                removed += before - list.len();
                !list.is_empty()
            });
            removed
        };
        if removed > 0 {
            self.reconcile_subscriptions();
        }
        removed
    }

    pub fn listener_count(&self, event: &EventName) -> usize {
        self.listeners.read().get(event).map_or(0, Vec::len)
    }

    /// `event → [(plugin, priority)]` in dispatch order.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<(String, i32)>> {
        self.listeners
            .read()
            .iter()
            .map(|(event, list)| {
                let entries = list
                    .iter()
                    .map(|l| (l.plugin.to_string(), l.priority))
                    .collect();
                (event.to_string(), entries)
            })
            .collect()
    }

    /// Number of platform subscriptions currently installed.
    pub fn events_activated(&self) -> usize {
        self.installed.lock().len()
    }

    /// Installs a forwarding handler for each platform event that gained its
    /// first listener, and removes the one of each event that lost its last.
    ///
    /// Lock order is `installed` then `listeners`, so the listener table read
    /// here is the one the installed set ends up matching.
    fn reconcile_subscriptions(&self) {
        let mut installed = self.installed.lock();
        let wanted: Vec<(UpdateKind, bool)> = {
            let table = self.listeners.read();
            UpdateKind::ALL
                .iter()
                .map(|&kind| (kind, table.contains_key(&EventName::from(kind))))
                .collect()
        };

        for (kind, wanted) in wanted {
            match (wanted, installed.get(&kind).copied()) {
                (true, None) => {
                    let id = self
                        .client
                        .add_handler(HandlerRoute::new(kind, LISTENER_GROUP), self.forwarder(kind));
                    installed.insert(kind, id);
                    debug!(event = %EventName::from(kind), "Platform subscription installed");
                }
                (false, Some(id)) => {
                    self.client.remove_handler(id);
                    installed.remove(&kind);
                    debug!(event = %EventName::from(kind), "Platform subscription removed");
                }
                _ => {}
            }
        }
    }

    fn forwarder(&self, kind: UpdateKind) -> UpdateHandler {
        let weak = self.weak.clone();
        Arc::new(move |update: Update| -> BoxFuture<'static, ()> {
            let weak = weak.clone();
            Box::pin(async move {
                if let Some(dispatcher) = weak.upgrade() {
                    dispatcher
                        .dispatch(&EventName::from(kind), EventPayload::Update(update))
                        .await;
                }
            })
        })
    }

    // ─── Dispatch ────────────────────────────────────────────────────────────

    /// Detached dispatch.
    pub async fn dispatch(&self, event: &EventName, payload: EventPayload) {
        self.dispatch_with(event, payload, DispatchMode::Detached)
            .await;
    }

    /// Collect-mode dispatch.
    pub async fn collect(&self, event: &EventName, payload: EventPayload) -> PendingTasks {
        self.dispatch_with(event, payload, DispatchMode::Collect)
            .await
    }

    /// Dispatches `payload` to every listener of `event`.
    ///
    /// Listener filters are checked in listener order before anything is
    /// scheduled. Returns the scheduled tasks in [`DispatchMode::Collect`],
    /// and an empty set otherwise.
    pub async fn dispatch_with(
        &self,
        event: &EventName,
        payload: EventPayload,
        mode: DispatchMode,
    ) -> PendingTasks {
        // Snapshot so handlers may (un)register listeners while we iterate.
        let listeners = match self.listeners.read().get(event) {
            Some(list) if !list.is_empty() => list.clone(),
            _ => return PendingTasks::default(),
        };

        let scope = payload
            .update()
            .map(|update| FilterScope::new(update, self.client.clone()));

        let mut permitted = Vec::with_capacity(listeners.len());
        for listener in listeners {
            if let (Some(filter), Some(scope)) = (&listener.filter, &scope)
                && !filter.evaluate(scope).await
            {
                trace!(plugin = %listener.plugin, event = %event, "Listener filtered out");
                continue;
            }
            permitted.push(listener);
        }

        if permitted.is_empty() {
            return PendingTasks::default();
        }
        debug!(event = %event, listeners = permitted.len(), "Dispatching event");

        if mode == DispatchMode::Detached && event.is_lifecycle() {
            for listener in permitted {
                let span = info_span!("listener", event = %event, plugin = %listener.plugin);
                let result = (listener.handler)(payload.clone()).instrument(span).await;
                if let Err(e) = result {
                    error!(plugin = %listener.plugin, event = %event, error = %e, "Listener failed");
                }
            }
            return PendingTasks::default();
        }

        let mut pending = PendingTasks::default();
        for listener in permitted {
            let span = info_span!("listener", event = %event, plugin = %listener.plugin);
            let fut = (listener.handler)(payload.clone());
            match mode {
                DispatchMode::Detached => {
                    let plugin = listener.plugin.clone();
                    let event = event.clone();
                    tokio::spawn(
                        async move {
                            if let Err(e) = fut.await {
                                error!(plugin = %plugin, event = %event, error = %e, "Listener failed");
                            }
                        }
                        .instrument(span),
                    );
                }
                DispatchMode::Collect => {
                    let handle = tokio::spawn(fut.instrument(span));
                    pending.tasks.push((listener.plugin, handle));
                }
            }
        }
        pending
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        for (_, id) in self.installed.get_mut().drain() {
            self.client.remove_handler(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockClient, group_chat, user};
    use pylon_core::Message;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn listener(plugin: &str, event: EventName, priority: i32, handler: ListenerHandler) -> Listener {
        Listener {
            plugin: Arc::from(plugin),
            event,
            priority,
            filter: None,
            handler,
        }
    }

    fn returning(value: Option<Value>) -> ListenerHandler {
        listener_fn(move |_| {
            let value = value.clone();
            async move { Ok(value) }
        })
    }

    fn failing() -> ListenerHandler {
        listener_fn(|_| async { Err::<Option<Value>, BoxError>("boom".into()) })
    }

    fn recording(log: Arc<Mutex<Vec<String>>>, tag: &'static str) -> ListenerHandler {
        listener_fn(move |_| {
            let log = log.clone();
            async move {
                log.lock().push(tag.to_string());
                Ok(None)
            }
        })
    }

    #[test]
    fn event_names_round_trip() {
        for name in ["load", "message", "chat_migrate", "plugin_backup", "welcome"] {
            assert_eq!(EventName::from(name).as_str(), name);
        }
        assert_eq!(EventName::ChatAction.handler_name(), "on_chat_action");
        assert!(EventName::Started.is_lifecycle());
        assert!(!EventName::Message.is_lifecycle());
    }

    #[tokio::test]
    async fn missing_event_yields_nothing() {
        let dispatcher = EventDispatcher::new(MockClient::new());
        let pending = dispatcher.collect(&EventName::PluginBackup, EventPayload::None).await;
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn collect_returns_one_task_per_listener() {
        let dispatcher = EventDispatcher::new(MockClient::new());
        dispatcher.add_listener(listener(
            "notes",
            EventName::PluginBackup,
            100,
            returning(Some(json!({ "notes": { "a": 1 } }))),
        ));
        dispatcher.add_listener(listener(
            "rules",
            EventName::PluginBackup,
            100,
            returning(Some(json!({}))),
        ));
        dispatcher.add_listener(listener("broken", EventName::PluginBackup, 100, failing()));
        dispatcher.add_listener(listener("silent", EventName::PluginBackup, 100, returning(None)));

        let pending = dispatcher
            .collect(&EventName::PluginBackup, EventPayload::Backup { chat_id: 1 })
            .await;
        assert_eq!(pending.len(), 4);

        let merged = pending.merge_objects().await;
        assert_eq!(Value::Object(merged), json!({ "notes": { "a": 1 } }));
    }

    #[tokio::test]
    async fn lifecycle_events_run_in_order_before_returning() {
        let dispatcher = EventDispatcher::new(MockClient::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.add_listener(listener("a", EventName::Load, 100, recording(log.clone(), "a")));
        dispatcher.add_listener(listener("b", EventName::Load, 100, failing()));
        dispatcher.add_listener(listener("c", EventName::Load, 100, recording(log.clone(), "c")));

        dispatcher.dispatch(&EventName::Load, EventPayload::None).await;
        assert_eq!(*log.lock(), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn priority_orders_listeners() {
        let dispatcher = EventDispatcher::new(MockClient::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.add_listener(listener("late", EventName::Start, 200, recording(log.clone(), "late")));
        dispatcher.add_listener(listener("first", EventName::Start, 10, recording(log.clone(), "first")));
        dispatcher.add_listener(listener("mid", EventName::Start, 100, recording(log.clone(), "mid")));
        dispatcher.add_listener(listener("mid2", EventName::Start, 100, recording(log.clone(), "mid2")));

        dispatcher
            .dispatch(&EventName::Start, EventPayload::Start { start_time_us: 0 })
            .await;
        assert_eq!(*log.lock(), vec!["first", "mid", "mid2", "late"]);
    }

    #[tokio::test]
    async fn detached_dispatch_does_not_wait() {
        let dispatcher = EventDispatcher::new(MockClient::new());
        let done = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let rx = Arc::new(tokio::sync::Mutex::new(Some(rx)));

        let done_in = done.clone();
        dispatcher.add_listener(listener(
            "slow",
            EventName::custom("tick"),
            100,
            listener_fn(move |_| {
                let done = done_in.clone();
                let rx = rx.clone();
                async move {
                    let rx = rx.lock().await.take();
                    if let Some(rx) = rx {
                        let _ = rx.await;
                    }
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                }
            }),
        ));

        dispatcher
            .dispatch(&EventName::custom("tick"), EventPayload::None)
            .await;
        assert_eq!(done.load(Ordering::SeqCst), 0);

        tx.send(()).unwrap();
        for _ in 0..50 {
            if done.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn listener_filter_skips_task() {
        let dispatcher = EventDispatcher::new(MockClient::new());
        let mut filtered = listener("f", EventName::Message, 100, returning(Some(json!({"f": 1}))));
        filtered.filter = Some(Filter::from_fn("never", |_| async { Ok(false) }));
        dispatcher.add_listener(filtered);
        dispatcher.add_listener(listener("g", EventName::Message, 100, returning(Some(json!({"g": 1})))));

        let message = Message::new(1, group_chat()).from_user(user(1)).with_text("hi");
        let pending = dispatcher
            .collect(&EventName::Message, EventPayload::Update(message.into()))
            .await;
        assert_eq!(pending.plugins(), vec!["g"]);
    }

    #[tokio::test]
    async fn subscriptions_follow_listener_presence() {
        let client = MockClient::new();
        let dispatcher = EventDispatcher::new(client.clone());
        assert_eq!(dispatcher.events_activated(), 0);

        dispatcher.add_listener(listener("a", EventName::Message, 100, returning(None)));
        dispatcher.add_listener(listener("b", EventName::Message, 100, returning(None)));
        dispatcher.add_listener(listener("b", EventName::ChatAction, 100, returning(None)));
        dispatcher.add_listener(listener("b", EventName::PluginBackup, 100, returning(None)));
        assert_eq!(dispatcher.events_activated(), 2);
        assert_eq!(client.handler_count(), 2);

        assert_eq!(dispatcher.remove_plugin("b"), 3);
        assert_eq!(dispatcher.events_activated(), 1);

        dispatcher.remove_plugin("a");
        assert_eq!(dispatcher.events_activated(), 0);
        assert_eq!(client.handler_count(), 0);
    }

    #[test]
    fn concurrent_table_changes_keep_subscriptions_in_step() {
        let client = MockClient::new();
        let dispatcher = EventDispatcher::new(client.clone());

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let dispatcher = &dispatcher;
                scope.spawn(move || {
                    let plugin = format!("worker{worker}");
                    for _ in 0..200 {
                        dispatcher.add_listener(listener(
                            &plugin,
                            EventName::Message,
                            100,
                            returning(None),
                        ));
                        dispatcher.remove_plugin(&plugin);
                    }
                });
            }
        });
        assert_eq!(dispatcher.listener_count(&EventName::Message), 0);
        assert_eq!(dispatcher.events_activated(), 0);
        assert_eq!(client.handler_count(), 0);

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let dispatcher = &dispatcher;
                scope.spawn(move || {
                    let plugin = format!("worker{worker}");
                    for round in 0..200 {
                        dispatcher.add_listener(listener(
                            &plugin,
                            EventName::Message,
                            100,
                            returning(None),
                        ));
                        if worker % 2 == 1 || round < 199 {
                            dispatcher.remove_plugin(&plugin);
                        }
                    }
                });
            }
        });
        assert_eq!(dispatcher.listener_count(&EventName::Message), 2);
        assert_eq!(dispatcher.events_activated(), 1);
        assert_eq!(client.handler_count(), 1);
    }

    #[tokio::test]
    async fn platform_updates_reach_listeners() {
        let client = MockClient::new();
        let dispatcher = EventDispatcher::new(client.clone());
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in = seen.clone();
        dispatcher.add_listener(listener(
            "counter",
            EventName::Message,
            100,
            listener_fn(move |payload| {
                let seen = seen_in.clone();
                async move {
                    if matches!(payload, EventPayload::Update(Update::Message(_))) {
                        seen.fetch_add(1, Ordering::SeqCst);
                    }
                    Ok(None)
                }
            }),
        ));

        let message = Message::new(1, group_chat()).from_user(user(1)).with_text("hi");
        client.emit(message.into()).await;

        for _ in 0..50 {
            if seen.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
