//! The plugin registry.
//!
//! [`PluginManager`] owns every loaded plugin together with the command table
//! (names and aliases, lowercased) and registers plugin listeners on the
//! [`EventDispatcher`]. Loading is all-or-nothing: if any command of a plugin
//! collides or fails to build, the listeners and commands registered so far
//! for that plugin are removed again.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::bot::Bot;
use crate::command::Command;
use crate::dispatcher::{EventDispatcher, EventName, Listener, ListenerHandler, ListenerOptions};
use crate::error::{PluginError, PluginResult};
use crate::plugin::{
    Plugin, PluginCatalog, PluginDescriptor, PluginInfo, PluginOrigin, capability_listeners,
};

// ─── Command table ───────────────────────────────────────────────────────────

/// Lowercased trigger → command.
#[derive(Default)]
struct CommandTable {
    by_trigger: HashMap<String, Command>,
}

impl CommandTable {
    /// Adds every trigger of `command`, or none of them.
    fn insert(&mut self, command: &Command) -> PluginResult<()> {
        for (index, trigger) in command.triggers().enumerate() {
            if let Some(existing) = self.by_trigger.get(trigger) {
                return Err(PluginError::DuplicateCommand {
                    existing: existing.name().to_string(),
                    existing_plugin: existing.plugin().to_string(),
                    command: trigger.to_string(),
                    plugin: command.plugin().to_string(),
                    alias: index > 0,
                });
            }
        }
        for trigger in command.triggers() {
            self.by_trigger.insert(trigger.to_string(), command.clone());
        }
        Ok(())
    }

    fn remove_plugin(&mut self, plugin: &str) {
        self.by_trigger.retain(|_, command| command.plugin() != plugin);
    }

    fn get(&self, trigger: &str) -> Option<Command> {
        self.by_trigger.get(trigger).cloned()
    }

    /// Every command once, sorted by name.
    fn commands(&self) -> Vec<Command> {
        let mut commands: Vec<Command> = Vec::new();
        for command in self.by_trigger.values() {
            if !commands.iter().any(|c| c.ptr_eq(command)) {
                commands.push(command.clone());
            }
        }
        commands.sort_by(|a, b| a.name().cmp(b.name()));
        commands
    }
}

// ─── PluginManager ───────────────────────────────────────────────────────────

struct PluginEntry {
    info: PluginInfo,
    plugin: Arc<dyn Plugin>,
}

/// Loads, tracks and unloads plugins.
pub struct PluginManager {
    bot: Bot,
    events: Arc<EventDispatcher>,
    catalog: RwLock<PluginCatalog>,
    plugins: RwLock<Vec<PluginEntry>>,
    commands: RwLock<CommandTable>,
    disabled: HashSet<String>,
    load_custom: bool,
}

impl PluginManager {
    /// A registry for `bot`, reading the link-time plugin catalog.
    pub fn new(bot: Bot, events: Arc<EventDispatcher>) -> Self {
        Self {
            bot,
            events,
            catalog: RwLock::new(PluginCatalog::with_static()),
            plugins: RwLock::new(Vec::new()),
            commands: RwLock::new(CommandTable::default()),
            disabled: HashSet::new(),
            load_custom: true,
        }
    }

    /// Replaces the catalog [`load_all`](Self::load_all) reads from.
    pub fn with_catalog(mut self, catalog: PluginCatalog) -> Self {
        self.catalog = RwLock::new(catalog);
        self
    }

    /// Names [`load_all`](Self::load_all) skips.
    pub fn disabled<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disabled.extend(names.into_iter().map(Into::into));
        self
    }

    /// Whether [`load_all`](Self::load_all) loads the custom set.
    pub fn load_custom(mut self, load_custom: bool) -> Self {
        self.load_custom = load_custom;
        self
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub fn events(&self) -> &Arc<EventDispatcher> {
        &self.events
    }

    // ─── Loading ─────────────────────────────────────────────────────────────

    /// Instantiates `descriptor` and registers its listeners and commands.
    ///
    /// `on_load` is not called here; the runtime dispatches
    /// [`EventName::Load`] once every plugin is in.
    pub fn load(&self, descriptor: &PluginDescriptor, comment: Option<&str>) -> PluginResult<()> {
        let info = PluginInfo::new(descriptor, comment);
        info!("Loading {info}");

        let mut plugins = self.plugins.write();
        if plugins.iter().any(|entry| entry.info.name == descriptor.name) {
            return Err(PluginError::DuplicatePlugin {
                name: descriptor.name.to_string(),
            });
        }

        let plugin = descriptor.instantiate(self.bot.clone());
        let name: Arc<str> = Arc::from(descriptor.name);
        if let Err(e) = self.register(&name, &plugin) {
            let listeners = self.events.remove_plugin(&name);
            self.commands.write().remove_plugin(&name);
            warn!(plugin = %name, listeners, error = %e, "Plugin registration rolled back");
            return Err(e);
        }

        plugins.push(PluginEntry { info, plugin });
        Ok(())
    }

    /// Loads `descriptor` and runs its `on_load` hook right away.
    ///
    /// For plugins added after start-up. A failing hook is logged; the plugin
    /// stays loaded.
    pub async fn load_and_init(
        &self,
        descriptor: &PluginDescriptor,
        comment: Option<&str>,
    ) -> PluginResult<()> {
        self.load(descriptor, comment)?;
        let hooks = self
            .plugin(descriptor.name)
            .and_then(|plugin| plugin.as_lifecycle_listener());
        if let Some(hooks) = hooks
            && let Err(e) = hooks.on_load().await
        {
            warn!(plugin = descriptor.name, error = %e, "on_load failed");
        }
        Ok(())
    }

    fn register(&self, name: &Arc<str>, plugin: &Arc<dyn Plugin>) -> PluginResult<()> {
        for (event, handler) in capability_listeners(plugin, name) {
            let options = plugin.listener_options(&event);
            self.add_listener(name, event, handler, options);
        }
        for subscription in plugin.clone().subscriptions() {
            let options = subscription
                .options
                .unwrap_or_else(|| plugin.listener_options(&subscription.event));
            self.add_listener(name, subscription.event, subscription.handler, options);
        }

        for builder in plugin.clone().commands() {
            let command = builder.build(&self.bot, name)?;
            self.commands.write().insert(&command)?;
            debug!(plugin = %name, command = command.name(), "Command registered");
        }
        Ok(())
    }

    fn add_listener(
        &self,
        plugin: &Arc<str>,
        event: EventName,
        handler: ListenerHandler,
        options: ListenerOptions,
    ) {
        self.events.add_listener(Listener {
            plugin: plugin.clone(),
            event,
            priority: options.priority,
            filter: options.filter.map(|filter| filter.bind(&self.bot)),
            handler,
        });
    }

    /// Loads the built-in set, then the custom set.
    ///
    /// Disabled descriptors and names disabled in the configuration are
    /// skipped. Stops at the first failure; plugins loaded before it stay.
    pub fn load_all(&self) -> PluginResult<usize> {
        let catalog = self.catalog.read().clone();
        let mut sets = vec![(PluginOrigin::Builtin, catalog.builtin())];
        if self.load_custom {
            sets.push((PluginOrigin::Custom, catalog.custom()));
        }

        let mut loaded = 0;
        for (origin, descriptors) in sets {
            for descriptor in descriptors {
                if descriptor.disabled || self.disabled.contains(descriptor.name) {
                    debug!(plugin = descriptor.name, "Plugin disabled, skipped");
                    continue;
                }
                self.load(descriptor, origin.comment())?;
                loaded += 1;
            }
        }
        info!(plugins = loaded, "Plugins loaded");
        Ok(loaded)
    }

    // ─── Unloading ───────────────────────────────────────────────────────────

    /// Removes the plugin with its commands and listeners.
    pub fn unload(&self, name: &str) -> PluginResult<()> {
        let entry = {
            let mut plugins = self.plugins.write();
            let index = plugins
                .iter()
                .position(|entry| entry.info.name == name)
                .ok_or_else(|| PluginError::NotLoaded(name.to_string()))?;
            plugins.remove(index)
        };
        let listeners = self.events.remove_plugin(name);
        self.commands.write().remove_plugin(name);
        info!(listeners, "Unloaded {}", entry.info);
        Ok(())
    }

    pub fn unload_all(&self) {
        let names: Vec<String> = self
            .plugins
            .read()
            .iter()
            .map(|entry| entry.info.name.clone())
            .collect();
        for name in names {
            if let Err(e) = self.unload(&name) {
                warn!(plugin = %name, error = %e, "Unload failed");
            }
        }
    }

    /// Re-reads the catalog sources. Loaded plugins are left alone.
    pub fn reload(&self) -> usize {
        let count = self.catalog.write().refresh();
        info!(descriptors = count, "Plugin catalog reloaded");
        count
    }

    // ─── Queries ─────────────────────────────────────────────────────────────

    /// The command registered under `trigger`, case-insensitively.
    pub fn command(&self, trigger: &str) -> Option<Command> {
        self.commands.read().get(&trigger.to_lowercase())
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.read().commands()
    }

    /// Loaded plugins in load order.
    pub fn plugins(&self) -> Vec<PluginInfo> {
        self.plugins
            .read()
            .iter()
            .map(|entry| entry.info.clone())
            .collect()
    }

    pub fn plugin(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins
            .read()
            .iter()
            .find(|entry| entry.info.name == name)
            .map(|entry| entry.plugin.clone())
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.plugins.read().iter().any(|entry| entry.info.name == name)
    }

    pub fn catalog(&self) -> PluginCatalog {
        self.catalog.read().clone()
    }

    /// Registers a listener owned by the loaded plugin `plugin`.
    ///
    /// The listener is removed together with the plugin.
    pub fn register_listener(
        &self,
        plugin: &str,
        event: impl Into<EventName>,
        handler: ListenerHandler,
        options: ListenerOptions,
    ) -> PluginResult<()> {
        if !self.is_loaded(plugin) {
            return Err(PluginError::NotLoaded(plugin.to_string()));
        }
        self.add_listener(&Arc::from(plugin), event.into(), handler, options);
        Ok(())
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("plugins", &self.plugins())
            .field("commands", &self.commands.read().by_trigger.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pylon_core::{ChatId, Message, OutgoingMessage, Update};
    use serde_json::{Value, json};
    use tower::BoxError;

    use super::*;
    use crate::command::CommandBuilder;
    use crate::dispatcher::{EventPayload, listener_fn};
    use crate::plugin::{
        BackupListener, HookResult, LifecycleListener, MessageListener, Subscription,
    };
    use crate::testing::{GROUP_ID, MockClient, group_chat, user};

    // ─── Fixtures ────────────────────────────────────────────────────────────

    struct Notes {
        bot: Bot,
    }

    impl Plugin for Notes {
        fn commands(self: Arc<Self>) -> Vec<CommandBuilder> {
            vec![
                Command::builder("Note")
                    .alias("save")
                    .handler(|_ctx, _args| async { "saved" }),
            ]
        }

        fn listener_options(&self, event: &EventName) -> ListenerOptions {
            match event {
                EventName::Message => ListenerOptions::default().priority(10),
                _ => ListenerOptions::default(),
            }
        }

        fn as_lifecycle_listener(self: Arc<Self>) -> Option<Arc<dyn LifecycleListener>> {
            Some(self)
        }

        fn as_message_listener(self: Arc<Self>) -> Option<Arc<dyn MessageListener>> {
            Some(self)
        }

        fn as_backup_listener(self: Arc<Self>) -> Option<Arc<dyn BackupListener>> {
            Some(self)
        }
    }

    #[async_trait]
    impl LifecycleListener for Notes {
        async fn on_load(&self) -> HookResult {
            self.bot
                .client()
                .send_message(GROUP_ID, OutgoingMessage::text("notes loaded"))
                .await?;
            Ok(())
        }
    }

    #[async_trait]
    impl MessageListener for Notes {
        async fn on_message(&self, message: Arc<Message>) -> HookResult {
            let text = format!("seen {}", message.text.as_deref().unwrap_or_default());
            self.bot
                .client()
                .send_message(message.chat.id, OutgoingMessage::text(text))
                .await?;
            Ok(())
        }
    }

    #[async_trait]
    impl BackupListener for Notes {
        async fn on_plugin_backup(&self, chat_id: ChatId) -> Result<Option<Value>, BoxError> {
            Ok((chat_id == GROUP_ID).then(|| json!({ "notes": ["hello"] })))
        }

        async fn on_plugin_restore(&self, chat_id: ChatId, data: Value) -> HookResult {
            self.bot
                .client()
                .send_message(chat_id, OutgoingMessage::text(format!("restored {data}")))
                .await?;
            Ok(())
        }
    }

    fn notes(bot: Bot) -> Arc<dyn Plugin> {
        Arc::new(Notes { bot })
    }

    /// Listens to messages and claims an alias `Notes` already owns.
    struct Clash;

    impl Plugin for Clash {
        fn commands(self: Arc<Self>) -> Vec<CommandBuilder> {
            vec![
                Command::builder("other").handler(|_ctx, _args| async {}),
                Command::builder("keep").alias("SAVE").handler(|_ctx, _args| async {}),
            ]
        }

        fn subscriptions(self: Arc<Self>) -> Vec<Subscription> {
            vec![Subscription::on(EventName::Message, |_payload| async { Ok(None) })]
        }
    }

    fn clash(_bot: Bot) -> Arc<dyn Plugin> {
        Arc::new(Clash)
    }

    struct Quiet;

    impl Plugin for Quiet {}

    fn quiet(_bot: Bot) -> Arc<dyn Plugin> {
        Arc::new(Quiet)
    }

    fn manager(client: &Arc<MockClient>, catalog: PluginCatalog) -> PluginManager {
        let events = EventDispatcher::new(client.clone());
        let bot = Bot::builder(client.clone()).build(&events);
        PluginManager::new(bot, events).with_catalog(catalog)
    }

    const NOTES: PluginDescriptor = PluginDescriptor::new("Notes", notes);
    const CLASH: PluginDescriptor = PluginDescriptor::new("Clash", clash);

    // ─── Tests ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn load_registers_commands_and_listeners() {
        let client = MockClient::new();
        let manager = manager(&client, PluginCatalog::new());
        manager.load(&NOTES, None).unwrap();

        let command = manager.command("NOTE").unwrap();
        assert_eq!(command.name(), "note");
        assert!(manager.command("save").unwrap().ptr_eq(&command));
        assert_eq!(manager.events().listener_count(&EventName::Message), 1);
        assert_eq!(manager.events().listener_count(&EventName::Load), 1);
        assert_eq!(manager.events().events_activated(), 1);
        assert_eq!(manager.events().snapshot()["message"], [("Notes".to_string(), 10)]);
    }

    #[tokio::test]
    async fn duplicate_plugin_keeps_the_first() {
        let client = MockClient::new();
        let manager = manager(&client, PluginCatalog::new());
        manager.load(&NOTES, None).unwrap();

        let err = manager.load(&NOTES, Some("custom")).unwrap_err();
        assert!(matches!(err, PluginError::DuplicatePlugin { ref name } if name == "Notes"));
        assert_eq!(manager.plugins().len(), 1);
        assert_eq!(manager.plugins()[0].comment, None);
        assert_eq!(manager.events().listener_count(&EventName::Message), 1);
    }

    #[tokio::test]
    async fn command_collision_rolls_back_the_plugin() {
        let client = MockClient::new();
        let manager = manager(&client, PluginCatalog::new());
        manager.load(&NOTES, None).unwrap();

        let err = manager.load(&CLASH, None).unwrap_err();
        match err {
            PluginError::DuplicateCommand {
                existing,
                existing_plugin,
                command,
                plugin,
                alias,
            } => {
                assert_eq!(existing, "note");
                assert_eq!(existing_plugin, "Notes");
                assert_eq!(command, "save");
                assert_eq!(plugin, "Clash");
                assert!(alias);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(!manager.is_loaded("Clash"));
        assert!(manager.command("other").is_none());
        assert!(manager.command("keep").is_none());
        assert_eq!(manager.command("save").unwrap().plugin(), "Notes");
        assert_eq!(manager.events().listener_count(&EventName::Message), 1);
    }

    #[tokio::test]
    async fn unload_detaches_everything() {
        let client = MockClient::new();
        let manager = manager(&client, PluginCatalog::new());
        manager.load(&NOTES, None).unwrap();
        assert_eq!(client.handler_count(), 1);

        manager.unload("Notes").unwrap();
        assert!(manager.command("note").is_none());
        assert!(manager.command("save").is_none());
        assert!(manager.events().snapshot().is_empty());
        assert_eq!(manager.events().events_activated(), 0);
        assert_eq!(client.handler_count(), 0);
        assert!(matches!(manager.unload("Notes"), Err(PluginError::NotLoaded(_))));
    }

    #[tokio::test]
    async fn load_all_orders_sets_and_skips_disabled() {
        let client = MockClient::new();
        let catalog = PluginCatalog::new()
            .source(PluginOrigin::Custom, || {
                vec![
                    PluginDescriptor::new("Quiet", quiet),
                    PluginDescriptor::new("Off", quiet).disabled(),
                ]
            })
            .source(PluginOrigin::Builtin, || {
                vec![NOTES, PluginDescriptor::new("Muted", quiet)]
            });
        let manager = manager(&client, catalog).disabled(["Muted"]);

        assert_eq!(manager.load_all().unwrap(), 2);
        let plugins = manager.plugins();
        let names: Vec<_> = plugins.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Notes", "Quiet"]);
        assert_eq!(plugins[1].to_string(), "custom plugin 'Quiet'");

        manager.unload_all();
        assert!(manager.plugins().is_empty());
    }

    #[tokio::test]
    async fn unload_all_then_load_all_restores_the_tables() {
        let client = MockClient::new();
        let catalog = PluginCatalog::new().source(PluginOrigin::Builtin, || {
            vec![NOTES, PluginDescriptor::new("Quiet", quiet)]
        });
        let manager = manager(&client, catalog);

        let tables = |manager: &PluginManager| {
            let mut commands: Vec<_> = manager
                .commands()
                .iter()
                .map(|c| (c.name().to_string(), c.aliases().to_vec()))
                .collect();
            commands.sort();
            (
                manager.events().snapshot(),
                commands,
                manager.events().events_activated(),
                client.handler_count(),
            )
        };

        assert_eq!(manager.load_all().unwrap(), 2);
        let fresh = tables(&manager);
        assert_eq!(fresh.1, [("note".to_string(), vec!["save".to_string()])]);
        assert_eq!(fresh.3, 1);

        manager.unload_all();
        assert_eq!(manager.load_all().unwrap(), 2);
        assert_eq!(tables(&manager), fresh);
    }

    #[tokio::test]
    async fn load_all_can_leave_out_custom_plugins() {
        let client = MockClient::new();
        let catalog = PluginCatalog::new()
            .source(PluginOrigin::Custom, || vec![PluginDescriptor::new("Quiet", quiet)]);
        let manager = manager(&client, catalog).load_custom(false);

        assert_eq!(manager.load_all().unwrap(), 0);
    }

    #[tokio::test]
    async fn lifecycle_runs_on_dispatch_or_init() {
        let client = MockClient::new();
        let manager = manager(&client, PluginCatalog::new());

        manager.load(&NOTES, None).unwrap();
        assert!(client.sent_texts().is_empty());
        manager.bot().dispatch(EventName::Load, EventPayload::None).await;
        assert_eq!(client.sent_texts(), ["notes loaded"]);

        manager.unload("Notes").unwrap();
        manager.load_and_init(&NOTES, None).await.unwrap();
        assert_eq!(client.sent_texts(), ["notes loaded", "notes loaded"]);
    }

    #[tokio::test]
    async fn backup_is_keyed_by_plugin_name() {
        let client = MockClient::new();
        let manager = manager(&client, PluginCatalog::new());
        manager.load(&NOTES, None).unwrap();

        let data = manager
            .bot()
            .dispatch_collect(EventName::PluginBackup, EventPayload::Backup { chat_id: GROUP_ID })
            .await
            .merge_objects()
            .await;
        assert_eq!(Value::Object(data.clone()), json!({ "Notes": { "notes": ["hello"] } }));

        let empty = manager
            .bot()
            .dispatch_collect(EventName::PluginBackup, EventPayload::Backup { chat_id: 5 })
            .await
            .merge_objects()
            .await;
        assert!(empty.is_empty());

        manager
            .bot()
            .dispatch_collect(
                EventName::PluginRestore,
                EventPayload::Restore {
                    chat_id: GROUP_ID,
                    data: Arc::new(Value::Object(data)),
                },
            )
            .await
            .join_all()
            .await;
        assert_eq!(client.sent_texts(), [r#"restored {"notes":["hello"]}"#]);
    }

    #[tokio::test]
    async fn message_listener_receives_updates() {
        let client = MockClient::new();
        let manager = manager(&client, PluginCatalog::new());
        manager.load(&NOTES, None).unwrap();

        let message = Message::new(1, group_chat()).from_user(user(7)).with_text("hi");
        let pending = manager
            .events()
            .collect(&EventName::Message, EventPayload::Update(Update::Message(Arc::new(message))))
            .await;
        assert_eq!(pending.plugins(), ["Notes"]);
        pending.join_all().await;
        assert_eq!(client.sent_texts(), ["seen hi"]);
    }

    #[tokio::test]
    async fn push_registration_requires_a_loaded_plugin() {
        let client = MockClient::new();
        let manager = manager(&client, PluginCatalog::new());
        let handler = listener_fn(|_payload| async { Ok(Some(json!({ "pong": true }))) });

        let err = manager
            .register_listener("Notes", "ping", handler.clone(), ListenerOptions::default())
            .unwrap_err();
        assert!(matches!(err, PluginError::NotLoaded(_)));

        manager.load(&NOTES, None).unwrap();
        manager
            .register_listener("Notes", "ping", handler, ListenerOptions::default())
            .unwrap();
        let merged = manager
            .bot()
            .dispatch_collect(EventName::custom("ping"), EventPayload::None)
            .await
            .merge_objects()
            .await;
        assert_eq!(merged["pong"], json!(true));

        manager.unload("Notes").unwrap();
        assert_eq!(manager.events().listener_count(&EventName::custom("ping")), 0);
    }

    #[tokio::test]
    async fn reload_refreshes_the_catalog_only() {
        let client = MockClient::new();
        let extra = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let source = extra.clone();
        let manager = manager(
            &client,
            PluginCatalog::new().source(PluginOrigin::Custom, move || source.lock().clone()),
        );
        manager.load(&NOTES, None).unwrap();

        extra.lock().push(PluginDescriptor::new("Quiet", quiet));
        assert_eq!(manager.reload(), 1);
        assert!(manager.catalog().find("Quiet").is_some());
        assert_eq!(manager.plugins().len(), 1);
    }
}
