//! Connection factory contract

use crate::config::ConnectionConfig;
use crate::error::FactoryError;
use std::marker::PhantomData;
use std::sync::Arc;

/// Builds live connections from configuration
///
/// The registry calls [`make`](ConnectionFactory::make) at most once per
/// pending entry, on its first successful resolution. The call is synchronous
/// from the registry's point of view and may block; no timeout is applied.
/// Errors are handed back to the caller of
/// [`ConnectionRegistry::connection`](crate::ConnectionRegistry::connection)
/// unchanged.
pub trait ConnectionFactory: Send + Sync {
    /// Connection type produced by this factory
    type Connection;

    /// Build a connection from configuration
    fn make(&self, config: &ConnectionConfig) -> Result<Self::Connection, FactoryError>;
}

/// Factory reference held by a registry
pub type SharedFactory<C> = Arc<dyn ConnectionFactory<Connection = C>>;

impl<T: ConnectionFactory + ?Sized> ConnectionFactory for Arc<T> {
    type Connection = T::Connection;

    fn make(&self, config: &ConnectionConfig) -> Result<Self::Connection, FactoryError> {
        (**self).make(config)
    }
}

/// Adapts a closure into a [`ConnectionFactory`]
///
/// # Examples
///
/// ```
/// use fraiseql_registry::{ConnectionConfig, ConnectionFactory, FnFactory};
///
/// let factory = FnFactory::new(|config: &ConnectionConfig| match config.driver() {
///     Some(driver) => Ok(driver.to_uppercase()),
///     None => Err("missing driver"),
/// });
///
/// let config = ConnectionConfig::new().setting("driver", "sqlite");
/// assert_eq!(factory.make(&config).unwrap(), "SQLITE");
/// assert!(factory.make(&ConnectionConfig::new()).is_err());
/// ```
pub struct FnFactory<F, C, E> {
    make: F,
    _marker: PhantomData<fn() -> (C, E)>,
}

impl<F, C, E> FnFactory<F, C, E>
where
    F: Fn(&ConnectionConfig) -> Result<C, E>,
{
    /// Wrap a closure
    pub fn new(make: F) -> Self {
        Self {
            make,
            _marker: PhantomData,
        }
    }
}

impl<F, C, E> ConnectionFactory for FnFactory<F, C, E>
where
    F: Fn(&ConnectionConfig) -> Result<C, E> + Send + Sync,
    E: Into<FactoryError>,
{
    type Connection = C;

    fn make(&self, config: &ConnectionConfig) -> Result<C, FactoryError> {
        (self.make)(config).map_err(Into::into)
    }
}

impl<F, C, E> std::fmt::Debug for FnFactory<F, C, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnFactory").finish_non_exhaustive()
    }
}
