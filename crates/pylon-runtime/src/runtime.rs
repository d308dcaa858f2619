//! Host lifecycle orchestration.
//!
//! [`PylonRuntime`] owns the dispatcher, the plugin manager and the command
//! router of one bot and drives them through start-up, idle and shutdown.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use pylon_runtime::PylonRuntime;
//!
//! // Config from ./pylon.toml, the user config dir and PYLON_* variables
//! let runtime = PylonRuntime::builder(client).build()?;
//! runtime.run().await?;
//!
//! // Explicit config file, persistent store
//! let runtime = PylonRuntime::builder(client)
//!     .config_file("config/pylon.toml")
//!     .store(store)
//!     .build()?;
//! ```
//!
//! # Lifecycle
//!
//! `start` loads every catalogued plugin, installs the router, dispatches
//! `load`, fetches the bot account, seeds staff and chat languages from the
//! store, then dispatches `start` and `started`. `stop` dispatches `stop`,
//! removes the router, dispatches `stopped`, unloads every plugin and closes
//! the store.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use pylon_core::{BoxedClient, BoxedStore, Document, HandlerId, MemoryStore, TextSource};
use pylon_framework::{
    Bot, CommandRouter, EventDispatcher, EventName, EventPayload, PluginCatalog, PluginManager,
};
use serde_json::Value;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ConfigLoader, PylonConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;

/// Collection holding one document per staff member, keyed by `_id`.
pub const STAFF_COLLECTION: &str = "STAFF";

/// Collection holding `{chat_id, language}` documents.
pub const LANGUAGE_COLLECTION: &str = "LANGUAGE";

/// The running host.
pub struct PylonRuntime {
    config: PylonConfig,
    events: Arc<EventDispatcher>,
    manager: Arc<PluginManager>,
    router: Arc<CommandRouter>,
    router_handler: Mutex<Option<HandlerId>>,
    running: AtomicBool,
    shutdown: CancellationToken,
}

impl PylonRuntime {
    pub fn builder(client: BoxedClient) -> RuntimeBuilder {
        RuntimeBuilder::new(client)
    }

    /// A runtime over `client` with an in-memory store, the link-time plugin
    /// catalog and no texts. `config` is validated first.
    pub fn from_config(client: BoxedClient, config: &PylonConfig) -> RuntimeResult<Self> {
        RuntimeBuilder::new(client).config(config.clone()).build()
    }

    fn from_parts(
        client: BoxedClient,
        config: PylonConfig,
        store: BoxedStore,
        texts: Option<Arc<dyn TextSource>>,
        catalog: Option<PluginCatalog>,
    ) -> Self {
        logging::init_from_config(&config.logging);

        let events = EventDispatcher::new(client.clone());
        let mut bot = Bot::builder(client)
            .settings(config.bot.to_settings())
            .store(store);
        if let Some(texts) = texts {
            bot = bot.texts(texts);
        }
        let bot = bot.build(&events);

        let mut manager = PluginManager::new(bot, events.clone())
            .disabled(config.plugins.disabled.iter().cloned())
            .load_custom(config.plugins.load_custom);
        if let Some(catalog) = catalog {
            manager = manager.with_catalog(catalog);
        }
        let manager = Arc::new(manager);
        let router = CommandRouter::new(manager.clone());

        info!(
            log_level = %config.logging.level,
            command_prefix = %config.bot.command_prefix,
            "Runtime initialized from configuration"
        );

        Self {
            config,
            events,
            manager,
            router,
            router_handler: Mutex::new(None),
            running: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &PylonConfig {
        &self.config
    }

    pub fn bot(&self) -> &Bot {
        self.manager.bot()
    }

    pub fn manager(&self) -> &Arc<PluginManager> {
        &self.manager
    }

    pub fn router(&self) -> &Arc<CommandRouter> {
        &self.router
    }

    pub fn events(&self) -> &Arc<EventDispatcher> {
        &self.events
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Token that ends [`idle`](Self::idle) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Asks a running [`idle`](Self::idle) to return.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    // ─── Start ───────────────────────────────────────────────────────────────

    /// Loads plugins and brings the bot online.
    ///
    /// On failure every plugin loaded so far is unloaded again and the router
    /// is removed.
    pub async fn start(&self) -> RuntimeResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Runtime is already running");
            return Ok(());
        }

        info!("Starting Pylon runtime");
        let began = Instant::now();
        if let Err(e) = self.boot().await {
            self.uninstall_router();
            self.manager.unload_all();
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        info!(
            plugins = self.manager.plugins().len(),
            commands = self.manager.commands().len(),
            elapsed_ms = began.elapsed().as_millis() as u64,
            "Runtime started"
        );
        Ok(())
    }

    async fn boot(&self) -> RuntimeResult<()> {
        let bot = self.manager.bot();

        let loaded = self.manager.load_all()?;
        debug!(plugins = loaded, "Plugins loaded");

        *self.router_handler.lock() = Some(self.router.install());

        bot.dispatch(EventName::Load, EventPayload::None).await;

        let me = bot.client().get_me().await?;
        info!(user_id = me.id, username = ?me.username, "Signed in");
        bot.set_me(me);

        self.seed_staff().await?;
        self.seed_languages().await?;

        bot.dispatch(
            EventName::Start,
            EventPayload::Start {
                start_time_us: unix_micros(),
            },
        )
        .await;
        bot.dispatch(EventName::Started, EventPayload::None).await;
        Ok(())
    }

    async fn seed_staff(&self) -> RuntimeResult<()> {
        let bot = self.manager.bot();
        let docs = bot
            .collection(STAFF_COLLECTION)
            .find(&Document::new())
            .await?;
        for doc in docs {
            match doc.get("_id").and_then(Value::as_i64) {
                Some(user) => {
                    bot.add_staff(user);
                }
                None => warn!(?doc, "Staff entry without a numeric _id"),
            }
        }
        debug!(staff = bot.staff().len(), "Staff seeded");
        Ok(())
    }

    async fn seed_languages(&self) -> RuntimeResult<()> {
        let bot = self.manager.bot();
        let docs = bot
            .collection(LANGUAGE_COLLECTION)
            .find(&Document::new())
            .await?;
        let mut seeded = 0usize;
        for doc in docs {
            let chat = doc.get("chat_id").and_then(Value::as_i64);
            let lang = doc.get("language").and_then(Value::as_str);
            match (chat, lang) {
                (Some(chat), Some(lang)) => {
                    bot.set_chat_language(chat, lang);
                    seeded += 1;
                }
                _ => warn!(?doc, "Malformed language entry"),
            }
        }
        debug!(chats = seeded, "Chat languages seeded");
        Ok(())
    }

    // ─── Idle ────────────────────────────────────────────────────────────────

    /// Waits for Ctrl+C, SIGTERM or [`shutdown`](Self::shutdown).
    pub async fn idle(&self) -> RuntimeResult<()> {
        tokio::select! {
            _ = self.shutdown.cancelled() => {
                info!("Shutdown requested");
                Ok(())
            }
            result = wait_for_signal() => result,
        }
    }

    // ─── Stop ────────────────────────────────────────────────────────────────

    /// Takes the bot offline and unloads every plugin.
    pub async fn stop(&self) -> RuntimeResult<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Runtime is not running");
            return Ok(());
        }

        info!("Stopping Pylon runtime");
        let bot = self.manager.bot();

        bot.dispatch(EventName::Stop, EventPayload::None).await;
        self.uninstall_router();
        bot.dispatch(EventName::Stopped, EventPayload::None).await;

        self.manager.unload_all();
        bot.store().close().await?;

        info!("Runtime stopped");
        Ok(())
    }

    fn uninstall_router(&self) {
        if let Some(id) = self.router_handler.lock().take() {
            self.manager.bot().client().remove_handler(id);
        }
    }

    // ─── Run ─────────────────────────────────────────────────────────────────

    /// Starts, idles until a shutdown signal, then stops.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await?;
        info!("Pylon is now running. Press Ctrl+C to stop.");

        let idled = self.idle().await;
        self.stop().await?;
        idled
    }

    /// Like [`run`](Self::run), but idles until `shutdown` completes or the
    /// shutdown token is cancelled.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        tokio::select! {
            _ = shutdown => {}
            _ = self.shutdown.cancelled() => {}
        }
        self.stop().await
    }
}

impl std::fmt::Debug for PylonRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PylonRuntime")
            .field("running", &self.is_running())
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

fn unix_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_micros() as u64)
}

async fn wait_for_signal() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for [`PylonRuntime`].
pub struct RuntimeBuilder {
    client: BoxedClient,
    config_loader: ConfigLoader,
    config: Option<PylonConfig>,
    store: Option<BoxedStore>,
    texts: Option<Arc<dyn TextSource>>,
    catalog: Option<PluginCatalog>,
}

impl RuntimeBuilder {
    pub fn new(client: BoxedClient) -> Self {
        Self {
            client,
            config_loader: ConfigLoader::new(),
            config: None,
            store: None,
            texts: None,
            catalog: None,
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges `config` over the loaded sources.
    pub fn merge(mut self, config: PylonConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Uses `config` instead of loading one; no file or environment is read.
    /// It is still validated by [`build`](Self::build).
    pub fn config(mut self, config: PylonConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn store(mut self, store: BoxedStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn texts(mut self, texts: Arc<dyn TextSource>) -> Self {
        self.texts = Some(texts);
        self
    }

    /// Replaces the link-time plugin catalog.
    pub fn catalog(mut self, catalog: PluginCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn build(mut self) -> RuntimeResult<PylonRuntime> {
        let config = match self.config.take() {
            Some(config) => {
                validate_config(&config)?;
                config
            }
            None => std::mem::take(&mut self.config_loader).load()?,
        };
        Ok(self.assemble(config))
    }

    fn assemble(self, config: PylonConfig) -> PylonRuntime {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        PylonRuntime::from_parts(self.client, config, store, self.texts, self.catalog)
    }
}

// =============================================================================
// Tests
// =============================================================================
