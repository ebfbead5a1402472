//! Named connection registry with lazy construction

use super::entry::{EntryState, RegistryEntry};
use super::factory::{ConnectionFactory, SharedFactory};
use crate::config::{ConnectionConfig, RegistryConfig};
use crate::metrics::{counters, histograms, labels};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Registry of named connections
///
/// Entries are either live connections or configuration. Resolving a
/// configuration entry builds it through the factory once and caches the
/// connection in place of the configuration; every later resolution of that
/// name returns the same `Arc`.
///
/// Mutation goes through `&mut self`. For concurrent access wrap the registry
/// in a [`SharedConnectionRegistry`](crate::SharedConnectionRegistry).
pub struct ConnectionRegistry<C> {
    entries: HashMap<String, RegistryEntry<C>>,
    default_name: Option<String>,
    factory: Option<SharedFactory<C>>,
}

impl<C> ConnectionRegistry<C> {
    /// Create a registry from initial entries and an optional factory
    ///
    /// Each entry is registered as if by [`add_connection`](Self::add_connection).
    /// No default connection is set.
    ///
    /// # Examples
    ///
    /// ```
    /// use fraiseql_registry::{ConnectionConfig, ConnectionRegistry, RegistryEntry};
    ///
    /// # fn main() -> fraiseql_registry::Result<()> {
    /// let registry = ConnectionRegistry::<()>::new(
    ///     [("main", RegistryEntry::from(ConnectionConfig::new().setting("driver", "sqlite")))],
    ///     None,
    /// )?;
    /// assert!(registry.has_connection("main"));
    /// assert_eq!(registry.default_connection(), None);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new<I, N, E>(entries: I, factory: Option<SharedFactory<C>>) -> Result<Self>
    where
        I: IntoIterator<Item = (N, E)>,
        N: Into<String>,
        E: Into<RegistryEntry<C>>,
    {
        let mut registry = Self {
            entries: HashMap::new(),
            default_name: None,
            factory,
        };
        for (name, entry) in entries {
            registry.add_connection(name, entry)?;
        }
        Ok(registry)
    }

    /// Create an empty registry without a factory
    ///
    /// Only live connections can be resolved from it.
    pub fn without_factory() -> Self {
        Self {
            entries: HashMap::new(),
            default_name: None,
            factory: None,
        }
    }

    /// Create an empty registry that builds pending entries with `factory`
    pub fn with_factory<F>(factory: F) -> Self
    where
        F: ConnectionFactory<Connection = C> + 'static,
    {
        Self {
            entries: HashMap::new(),
            default_name: None,
            factory: Some(Arc::new(factory)),
        }
    }

    /// Create a registry from a registry document
    ///
    /// Every connection in the document is registered as pending
    /// configuration, and the document's default name (if any) is applied.
    pub fn from_config(config: RegistryConfig, factory: Option<SharedFactory<C>>) -> Result<Self> {
        let mut registry = Self::new(config.configs()?, factory)?;
        registry.default_name = config.default;
        Ok(registry)
    }

    /// Register a live connection or configuration under `name`
    ///
    /// An existing entry with the same name, live or pending, is replaced.
    pub fn add_connection(
        &mut self,
        name: impl Into<String>,
        entry: impl Into<RegistryEntry<C>>,
    ) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Config("connection name must not be empty".into()));
        }

        let entry = entry.into();
        tracing::trace!(name = %name, state = %entry.state(), "registering connection");
        if let Some(previous) = self.entries.insert(name, entry) {
            tracing::trace!(previous = %previous.state(), "replaced existing connection");
        }
        Ok(())
    }

    /// Register configuration from an untyped value
    ///
    /// JSON objects are registered as pending configuration. Any other value
    /// fails with [`Error::InvalidEntryKind`] and leaves the registry as it
    /// was.
    pub fn add_connection_value(&mut self, name: impl Into<String>, value: Value) -> Result<()> {
        let name = name.into();
        let entry = RegistryEntry::from_value(&name, value)?;
        self.add_connection(name, entry)
    }

    /// Check if a connection has been registered
    ///
    /// Never triggers construction.
    pub fn has_connection(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Get a connection by name, or the default connection when `name` is `None`
    ///
    /// Pending entries are built through the factory on first resolution and
    /// cached. A factory failure leaves the entry pending, so a later call
    /// retries with the same configuration.
    ///
    /// # Errors
    ///
    /// * [`Error::UnknownConnection`] if nothing is registered under the
    ///   resolved name. With no name and no default the resolved name is `""`.
    /// * [`Error::NoFactoryConfigured`] if the entry is pending and the
    ///   registry has no factory.
    /// * [`Error::Factory`] with the factory's own error.
    pub fn connection(&mut self, name: Option<&str>) -> Result<Arc<C>> {
        let name = match self.target_name(name) {
            Some(name) => name.to_owned(),
            None => return Err(no_target()),
        };

        let span = tracing::debug_span!("resolve_connection", name = %name);
        let _enter = span.enter();

        let result = self.resolve(&name);
        if let Err(ref e) = result {
            counters::resolution_error(&name, e);
        }
        result
    }

    fn resolve(&mut self, name: &str) -> Result<Arc<C>> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| Error::UnknownConnection(name.to_owned()))?;

        let config = match &*entry {
            RegistryEntry::Live(connection) => {
                tracing::trace!("connection cache hit");
                counters::connection_resolved(name, labels::SOURCE_CACHE);
                return Ok(Arc::clone(connection));
            }
            RegistryEntry::Pending(config) => config,
        };

        let connection = Arc::new(make_connection(self.factory.as_ref(), name, config)?);
        upgrade(entry, Arc::clone(&connection));

        tracing::debug!("connection constructed");
        counters::connection_resolved(name, labels::SOURCE_FACTORY);
        Ok(connection)
    }

    /// Name a resolution of `name` targets: `name` itself or the default
    pub(crate) fn target_name<'a>(&'a self, name: Option<&'a str>) -> Option<&'a str> {
        name.or(self.default_name.as_deref())
    }

    /// Live connection for `name` (or the default), without building anything
    pub(crate) fn cached(&self, name: Option<&str>) -> Option<Arc<C>> {
        let name = self.target_name(name)?;
        let connection = self.entries.get(name)?.as_live()?;
        counters::connection_resolved(name, labels::SOURCE_CACHE);
        Some(Arc::clone(connection))
    }

    /// What resolving `name` requires, so a caller can build outside a lock
    pub(crate) fn resolution(&self, name: &str) -> Result<Resolution<C>> {
        match self.entries.get(name) {
            None => Err(Error::UnknownConnection(name.to_owned())),
            Some(RegistryEntry::Live(connection)) => Ok(Resolution::Live(Arc::clone(connection))),
            Some(RegistryEntry::Pending(config)) => {
                let factory = self.factory.clone().ok_or_else(|| Error::NoFactoryConfigured {
                    name: name.to_owned(),
                })?;
                Ok(Resolution::Build {
                    config: config.clone(),
                    factory,
                })
            }
        }
    }

    /// Cache a connection built from `config` for `name`
    ///
    /// Only upgrades an entry that is still pending with the same
    /// configuration; returns whether it did.
    pub(crate) fn install(
        &mut self,
        name: &str,
        config: &ConnectionConfig,
        connection: Arc<C>,
    ) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) if entry.as_pending() == Some(config) => {
                upgrade(entry, connection);
                true
            }
            _ => false,
        }
    }

    /// Get the default connection name
    pub fn default_connection(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// Set the default connection name
    ///
    /// The name is not checked against registered entries; an unknown name
    /// surfaces as [`Error::UnknownConnection`] on the next resolution.
    pub fn set_default_connection(&mut self, name: impl Into<String>) {
        self.default_name = Some(name.into());
    }

    /// Whether a factory was supplied
    pub fn has_factory(&self) -> bool {
        self.factory.is_some()
    }

    /// State of the entry registered under `name`, without building it
    pub fn entry_state(&self, name: &str) -> Option<EntryState> {
        self.entries.get(name).map(RegistryEntry::state)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no connections are registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of looking up a name without building it
pub(crate) enum Resolution<C> {
    Live(Arc<C>),
    Build {
        config: ConnectionConfig,
        factory: SharedFactory<C>,
    },
}

/// Error for a resolution with neither a name nor a default
pub(crate) fn no_target() -> Error {
    let err = Error::UnknownConnection(String::new());
    counters::resolution_error("", &err);
    err
}

fn upgrade<C>(entry: &mut RegistryEntry<C>, connection: Arc<C>) {
    debug_assert!(entry.state().can_transition_to(EntryState::Live));
    *entry = RegistryEntry::Live(connection);
}

/// Build a pending entry through the factory
pub(crate) fn make_connection<C>(
    factory: Option<&SharedFactory<C>>,
    name: &str,
    config: &ConnectionConfig,
) -> Result<C> {
    let factory = factory.ok_or_else(|| Error::NoFactoryConfigured {
        name: name.to_owned(),
    })?;

    tracing::debug!(driver = config.driver().unwrap_or("unknown"), "building connection");
    counters::factory_invoked(name);

    let start = Instant::now();
    let result = factory.make(config).map_err(Error::Factory);
    histograms::factory_duration(name, start.elapsed().as_millis() as u64);

    result
}

impl<C> Default for ConnectionRegistry<C> {
    fn default() -> Self {
        Self::without_factory()
    }
}

impl<C> std::fmt::Debug for ConnectionRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries: std::collections::BTreeMap<&str, EntryState> = self
            .entries
            .iter()
            .map(|(name, entry)| (name.as_str(), entry.state()))
            .collect();

        f.debug_struct("ConnectionRegistry")
            .field("entries", &entries)
            .field("default_name", &self.default_name)
            .field("has_factory", &self.factory.is_some())
            .finish()
    }
}
