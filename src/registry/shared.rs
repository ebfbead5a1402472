//! Shared registry handle for multi-threaded hosts

use super::entry::{EntryState, RegistryEntry};
use super::resolver::{self, ConnectionRegistry, Resolution};
use crate::metrics::{counters, labels};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OnceCell, RwLock};
use tokio::task;
use tracing::Instrument;

/// Per-name slot shared by every task waiting on the same build
type BuildCell<C> = Arc<OnceCell<Arc<C>>>;

/// Cloneable, lock-guarded [`ConnectionRegistry`]
///
/// Lookups only ever take the read lock. A pending entry is built on the
/// blocking thread pool, outside any registry lock, behind a per-name cell:
/// concurrent first resolutions of the same name invoke the factory at most
/// once and all get that connection, while other names keep resolving.
///
/// # Examples
///
/// ```
/// use fraiseql_registry::{ConnectionConfig, ConnectionRegistry, FnFactory, SharedConnectionRegistry};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> fraiseql_registry::Result<()> {
/// let factory = FnFactory::new(|config: &ConnectionConfig| {
///     Ok::<_, std::io::Error>(config.get_str("path").unwrap_or_default().to_string())
/// });
///
/// let shared = SharedConnectionRegistry::new(ConnectionRegistry::with_factory(factory));
/// shared
///     .add_connection("main", ConnectionConfig::from_url("sqlite::memory:")?)
///     .await?;
///
/// let worker = shared.clone();
/// let handle = tokio::spawn(async move { worker.connection(Some("main")).await });
/// let conn = handle.await.expect("task panicked")?;
/// assert_eq!(conn.as_str(), ":memory:");
/// # Ok(())
/// # }
/// ```
pub struct SharedConnectionRegistry<C> {
    inner: Arc<RwLock<ConnectionRegistry<C>>>,
    // Only locked briefly while a registry guard is held, never across an await
    building: Arc<Mutex<HashMap<String, BuildCell<C>>>>,
}

impl<C: Send + Sync + 'static> SharedConnectionRegistry<C> {
    /// Get a connection by name, or the default connection when `name` is `None`
    ///
    /// Same semantics and errors as [`ConnectionRegistry::connection`]. The
    /// factory runs on tokio's blocking pool.
    pub async fn connection(&self, name: Option<&str>) -> Result<Arc<C>> {
        let (name, cell) = {
            let registry = self.inner.read().await;
            if let Some(connection) = registry.cached(name) {
                return Ok(connection);
            }
            let Some(name) = registry.target_name(name) else {
                return Err(resolver::no_target());
            };
            if !registry.has_connection(name) {
                let err = Error::UnknownConnection(name.to_owned());
                counters::resolution_error(name, &err);
                return Err(err);
            }
            // Taken under the read lock so a replacement of the entry, which
            // drops its cell under the write lock, is never missed
            (name.to_owned(), self.build_cell(name))
        };

        let span = tracing::debug_span!("resolve_connection", name = %name);
        let result = cell
            .get_or_try_init(|| self.build(&name, &cell))
            .instrument(span)
            .await
            .map(Arc::clone);
        if let Err(ref e) = result {
            counters::resolution_error(&name, e);
        }
        result
    }

    async fn build(&self, name: &str, cell: &BuildCell<C>) -> Result<Arc<C>> {
        let resolution = self.inner.read().await.resolution(name)?;
        let (config, factory) = match resolution {
            Resolution::Live(connection) => return Ok(connection),
            Resolution::Build { config, factory } => (config, factory),
        };

        let span = tracing::Span::current();
        let task_name = name.to_owned();
        let task_config = config.clone();
        let connection = task::spawn_blocking(move || {
            span.in_scope(|| resolver::make_connection(Some(&factory), &task_name, &task_config))
        })
        .await
        .map_err(|e| Error::Factory(e.into()))??;
        let connection = Arc::new(connection);

        let mut registry = self.inner.write().await;
        if registry.install(name, &config, Arc::clone(&connection)) {
            tracing::debug!("connection constructed");
        } else {
            tracing::debug!("entry replaced while building, result not cached");
        }
        counters::connection_resolved(name, labels::SOURCE_FACTORY);
        self.forget_build(name, Some(cell));
        drop(registry);

        Ok(connection)
    }
}

impl<C> SharedConnectionRegistry<C> {
    /// Wrap a registry
    pub fn new(registry: ConnectionRegistry<C>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
            building: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn build_cell(&self, name: &str) -> BuildCell<C> {
        let mut building = self.building.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(building.entry(name.to_owned()).or_default())
    }

    /// Drop the build cell for `name`; with `cell` given, only if it is that cell
    fn forget_build(&self, name: &str, cell: Option<&BuildCell<C>>) {
        let mut building = self.building.lock().unwrap_or_else(PoisonError::into_inner);
        let matches = match (building.get(name), cell) {
            (Some(current), Some(cell)) => Arc::ptr_eq(current, cell),
            (Some(_), None) => true,
            (None, _) => false,
        };
        if matches {
            building.remove(name);
        }
    }

    /// Register a live connection or configuration under `name`
    pub async fn add_connection(
        &self,
        name: impl Into<String>,
        entry: impl Into<RegistryEntry<C>>,
    ) -> Result<()> {
        let name = name.into();
        let mut registry = self.inner.write().await;
        registry.add_connection(name.clone(), entry)?;
        self.forget_build(&name, None);
        Ok(())
    }

    /// Register configuration from an untyped value
    pub async fn add_connection_value(&self, name: impl Into<String>, value: Value) -> Result<()> {
        let name = name.into();
        let mut registry = self.inner.write().await;
        registry.add_connection_value(name.clone(), value)?;
        self.forget_build(&name, None);
        Ok(())
    }

    /// Check if a connection has been registered
    pub async fn has_connection(&self, name: &str) -> bool {
        self.inner.read().await.has_connection(name)
    }

    /// Get the default connection name
    pub async fn default_connection(&self) -> Option<String> {
        self.inner.read().await.default_connection().map(str::to_owned)
    }

    /// Set the default connection name
    pub async fn set_default_connection(&self, name: impl Into<String>) {
        self.inner.write().await.set_default_connection(name);
    }

    /// State of the entry registered under `name`, without building it
    pub async fn entry_state(&self, name: &str) -> Option<EntryState> {
        self.inner.read().await.entry_state(name)
    }

    /// Registered names, sorted
    pub async fn names(&self) -> Vec<String> {
        self.inner
            .read()
            .await
            .names()
            .into_iter()
            .map(str::to_owned)
            .collect()
    }

    /// Number of registered connections
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Whether no connections are registered
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

impl<C> Clone for SharedConnectionRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            building: Arc::clone(&self.building),
        }
    }
}

impl<C> From<ConnectionRegistry<C>> for SharedConnectionRegistry<C> {
    fn from(registry: ConnectionRegistry<C>) -> Self {
        Self::new(registry)
    }
}

impl<C> std::fmt::Debug for SharedConnectionRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_read() {
            Ok(registry) => f
                .debug_struct("SharedConnectionRegistry")
                .field("registry", &*registry)
                .finish(),
            Err(_) => f
                .debug_struct("SharedConnectionRegistry")
                .finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::registry::{ConnectionFactory, FnFactory};
    use crate::Error;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    #[derive(Debug)]
    struct Conn(usize);

    fn slow_factory(calls: Arc<AtomicUsize>) -> impl ConnectionFactory<Connection = Conn> + 'static {
        FnFactory::new(move |_: &ConnectionConfig| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            Ok::<_, std::io::Error>(Conn(n))
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_resolution_builds_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let shared = SharedConnectionRegistry::new(ConnectionRegistry::with_factory(
            slow_factory(calls.clone()),
        ));
        shared
            .add_connection("main", ConnectionConfig::new().setting("driver", "sqlite"))
            .await
            .unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let shared = shared.clone();
                tokio::spawn(async move { shared.connection(Some("main")).await.unwrap() })
            })
            .collect();

        let mut connections = Vec::new();
        for handle in handles {
            connections.push(handle.await.unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(connections
            .iter()
            .all(|conn| Arc::ptr_eq(conn, &connections[0])));
        assert_eq!(connections[0].0, 0);
    }

    #[tokio::test]
    async fn test_unknown_and_default() {
        let shared = SharedConnectionRegistry::new(ConnectionRegistry::<Conn>::without_factory());
        shared.set_default_connection("missing").await;
        assert_eq!(shared.default_connection().await.as_deref(), Some("missing"));

        let err = shared.connection(None).await.unwrap_err();
        assert!(matches!(err, Error::UnknownConnection(ref name) if name == "missing"));
        assert!(shared.building.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_live_entry_and_introspection() {
        let shared: SharedConnectionRegistry<Conn> = ConnectionRegistry::without_factory().into();
        assert!(shared.is_empty().await);

        let live = Arc::new(Conn(42));
        shared.add_connection("b", Arc::clone(&live)).await.unwrap();
        shared
            .add_connection_value("a", serde_json::json!({"driver": "sqlite"}))
            .await
            .unwrap();

        assert_eq!(shared.len().await, 2);
        assert_eq!(shared.names().await, vec!["a".to_string(), "b".to_string()]);
        assert!(shared.has_connection("a").await);
        assert_eq!(shared.entry_state("a").await, Some(EntryState::Pending));
        assert_eq!(shared.entry_state("b").await, Some(EntryState::Live));

        let resolved = shared.connection(Some("b")).await.unwrap();
        assert!(Arc::ptr_eq(&live, &resolved));

        let err = shared.connection(Some("a")).await.unwrap_err();
        assert!(matches!(err, Error::NoFactoryConfigured { .. }));
    }

    /// Factory that flags when it starts and takes `delay` for the `slow` driver
    fn flagged_factory(
        started: Arc<AtomicBool>,
        calls: Arc<AtomicUsize>,
        delay: Duration,
    ) -> impl ConnectionFactory<Connection = Conn> + 'static {
        FnFactory::new(move |config: &ConnectionConfig| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if config.driver() == Some("slow") {
                started.store(true, Ordering::SeqCst);
                std::thread::sleep(delay);
            }
            Ok::<_, std::io::Error>(Conn(n))
        })
    }

    async fn wait_for(flag: &AtomicBool) {
        while !flag.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_live_entry_resolves_while_another_builds() {
        let started = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));
        let shared = SharedConnectionRegistry::new(ConnectionRegistry::with_factory(
            flagged_factory(started.clone(), calls.clone(), Duration::from_millis(500)),
        ));
        let fast = Arc::new(Conn(99));
        shared.add_connection("fast", Arc::clone(&fast)).await.unwrap();
        shared
            .add_connection("slow", ConnectionConfig::new().setting("driver", "slow"))
            .await
            .unwrap();

        let worker = shared.clone();
        let slow = tokio::spawn(async move { worker.connection(Some("slow")).await });
        wait_for(&started).await;

        let start = Instant::now();
        let resolved = shared.connection(Some("fast")).await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(250));
        assert!(Arc::ptr_eq(&fast, &resolved));
        assert_eq!(shared.entry_state("slow").await, Some(EntryState::Pending));

        let built = slow.await.unwrap().unwrap();
        assert_eq!(built.0, 0);
        assert_eq!(shared.entry_state("slow").await, Some(EntryState::Live));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_replacement_during_build_is_kept() {
        let started = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));
        let shared = SharedConnectionRegistry::new(ConnectionRegistry::with_factory(
            flagged_factory(started.clone(), calls.clone(), Duration::from_millis(200)),
        ));
        shared
            .add_connection("main", ConnectionConfig::new().setting("driver", "slow"))
            .await
            .unwrap();

        let worker = shared.clone();
        let first = tokio::spawn(async move { worker.connection(Some("main")).await });
        wait_for(&started).await;

        shared
            .add_connection("main", ConnectionConfig::new().setting("driver", "sqlite"))
            .await
            .unwrap();

        // The in-flight caller still gets its connection, but it is not cached
        // over the new configuration
        assert_eq!(first.await.unwrap().unwrap().0, 0);
        assert_eq!(shared.entry_state("main").await, Some(EntryState::Pending));

        let second = shared.connection(Some("main")).await.unwrap();
        assert_eq!(second.0, 1);
        assert_eq!(shared.entry_state("main").await, Some(EntryState::Live));
    }

    #[tokio::test]
    async fn test_failed_build_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let factory = FnFactory::new(move |_: &ConnectionConfig| {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out")),
                n => Ok(Conn(n)),
            }
        });
        let shared = SharedConnectionRegistry::new(ConnectionRegistry::with_factory(factory));
        shared
            .add_connection("main", ConnectionConfig::new().setting("driver", "sqlite"))
            .await
            .unwrap();

        let err = shared.connection(Some("main")).await.unwrap_err();
        assert!(err.is_retriable());
        assert_eq!(shared.entry_state("main").await, Some(EntryState::Pending));

        let conn = shared.connection(Some("main")).await.unwrap();
        assert_eq!(conn.0, 1);
        let again = shared.connection(Some("main")).await.unwrap();
        assert!(Arc::ptr_eq(&conn, &again));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_name_and_no_default() {
        let shared = SharedConnectionRegistry::new(ConnectionRegistry::<Conn>::without_factory());
        let err = shared.connection(None).await.unwrap_err();
        assert!(matches!(err, Error::UnknownConnection(ref name) if name.is_empty()));
    }
}
