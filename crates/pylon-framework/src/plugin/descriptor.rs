//! Plugin descriptor and the catalog of descriptors known to the host.

use std::fmt;
use std::sync::Arc;

use linkme::distributed_slice;

use super::Plugin;
use crate::bot::Bot;

// ─── PluginDescriptor ────────────────────────────────────────────────────────

/// A static, `Copy` handle that names a plugin and creates it.
///
/// ```rust,ignore
/// fn create(bot: Bot) -> Arc<dyn Plugin> {
///     Arc::new(Notes::new(bot))
/// }
///
/// builtin_plugin!(NOTES = PluginDescriptor::new("Notes", create).helpable());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PluginDescriptor {
    /// Unique name, also the key of the plugin's backup section.
    pub name: &'static str,
    pub description: &'static str,
    /// Skipped by [`PluginManager::load_all`](crate::manager::PluginManager::load_all).
    pub disabled: bool,
    /// Listed by help commands.
    pub helpable: bool,
    /// Creates the live plugin.
    pub create: fn(Bot) -> Arc<dyn Plugin>,
}

impl PluginDescriptor {
    pub const fn new(name: &'static str, create: fn(Bot) -> Arc<dyn Plugin>) -> Self {
        Self {
            name,
            description: "",
            disabled: false,
            helpable: false,
            create,
        }
    }

    pub const fn description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub const fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub const fn helpable(mut self) -> Self {
        self.helpable = true;
        self
    }

    #[inline]
    pub fn instantiate(&self, bot: Bot) -> Arc<dyn Plugin> {
        (self.create)(bot)
    }
}

// ─── Static registration ─────────────────────────────────────────────────────

/// Plugins shipped with the host. Contribute with [`builtin_plugin!`].
#[distributed_slice]
pub static BUILTIN_PLUGINS: [PluginDescriptor];

/// User plugins, loaded with the comment `"custom"`. Contribute with
/// [`custom_plugin!`].
#[distributed_slice]
pub static CUSTOM_PLUGINS: [PluginDescriptor];

/// Adds a descriptor to [`BUILTIN_PLUGINS`].
///
/// ```rust,ignore
/// builtin_plugin!(NOTES = PluginDescriptor::new("Notes", create));
/// ```
#[macro_export]
macro_rules! builtin_plugin {
    ($static_name:ident = $descriptor:expr $(,)?) => {
        #[$crate::plugin::__linkme::distributed_slice($crate::plugin::BUILTIN_PLUGINS)]
        #[linkme(crate = $crate::plugin::__linkme)]
        static $static_name: $crate::plugin::PluginDescriptor = $descriptor;
    };
}

/// Adds a descriptor to [`CUSTOM_PLUGINS`].
#[macro_export]
macro_rules! custom_plugin {
    ($static_name:ident = $descriptor:expr $(,)?) => {
        #[$crate::plugin::__linkme::distributed_slice($crate::plugin::CUSTOM_PLUGINS)]
        #[linkme(crate = $crate::plugin::__linkme)]
        static $static_name: $crate::plugin::PluginDescriptor = $descriptor;
    };
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// Which set a descriptor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginOrigin {
    Builtin,
    Custom,
}

impl PluginOrigin {
    /// Provenance tag recorded for plugins of this origin.
    pub fn comment(self) -> Option<&'static str> {
        match self {
            Self::Builtin => None,
            Self::Custom => Some("custom"),
        }
    }
}

/// Produces descriptors each time the catalog is refreshed.
pub type CatalogSource = Arc<dyn Fn() -> Vec<PluginDescriptor> + Send + Sync>;

/// The descriptors the registry can load, grouped by origin.
///
/// Sources are read again by [`refresh`](Self::refresh); loaded plugins are
/// not affected.
#[derive(Clone, Default)]
pub struct PluginCatalog {
    sources: Vec<(PluginOrigin, CatalogSource)>,
    builtin: Vec<PluginDescriptor>,
    custom: Vec<PluginDescriptor>,
}

impl PluginCatalog {
    /// An empty catalog without sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog reading [`BUILTIN_PLUGINS`] and [`CUSTOM_PLUGINS`].
    pub fn with_static() -> Self {
        Self::new()
            .source(PluginOrigin::Builtin, || BUILTIN_PLUGINS.to_vec())
            .source(PluginOrigin::Custom, || CUSTOM_PLUGINS.to_vec())
    }

    /// Adds a source and reads it immediately.
    pub fn source<F>(mut self, origin: PluginOrigin, source: F) -> Self
    where
        F: Fn() -> Vec<PluginDescriptor> + Send + Sync + 'static,
    {
        self.sources.push((origin, Arc::new(source)));
        self.refresh();
        self
    }

    /// Re-reads every source. Returns the number of descriptors.
    pub fn refresh(&mut self) -> usize {
        self.builtin.clear();
        self.custom.clear();
        for (origin, source) in &self.sources {
            let set = match origin {
                PluginOrigin::Builtin => &mut self.builtin,
                PluginOrigin::Custom => &mut self.custom,
            };
            for descriptor in source() {
                if !set.iter().any(|d| d.name == descriptor.name) {
                    set.push(descriptor);
                }
            }
        }
        self.len()
    }

    pub fn builtin(&self) -> &[PluginDescriptor] {
        &self.builtin
    }

    pub fn custom(&self) -> &[PluginDescriptor] {
        &self.custom
    }

    pub fn len(&self) -> usize {
        self.builtin.len() + self.custom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks a descriptor up by name, built-in set first.
    pub fn find(&self, name: &str) -> Option<(PluginOrigin, PluginDescriptor)> {
        let builtin = self.builtin.iter().map(|d| (PluginOrigin::Builtin, *d));
        let custom = self.custom.iter().map(|d| (PluginOrigin::Custom, *d));
        builtin.chain(custom).find(|(_, d)| d.name == name)
    }
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("sources", &self.sources.len())
            .field("builtin", &self.builtin.iter().map(|d| d.name).collect::<Vec<_>>())
            .field("custom", &self.custom.iter().map(|d| d.name).collect::<Vec<_>>())
            .finish()
    }
}

// ─── PluginInfo ──────────────────────────────────────────────────────────────

/// Snapshot of a loaded plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub name: String,
    pub description: String,
    pub helpable: bool,
    pub comment: Option<String>,
}

impl PluginInfo {
    pub(crate) fn new(descriptor: &PluginDescriptor, comment: Option<&str>) -> Self {
        Self {
            name: descriptor.name.to_string(),
            description: descriptor.description.to_string(),
            helpable: descriptor.helpable,
            comment: comment.map(str::to_string),
        }
    }
}

/// `custom plugin 'Notes'`, or `plugin 'Notes'` without a comment.
impl fmt::Display for PluginInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(comment) = &self.comment {
            write!(f, "{comment} ")?;
        }
        write!(f, "plugin '{}'", self.name)
    }
}
