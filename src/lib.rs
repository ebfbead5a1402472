//! fraiseql-registry: named database connections, resolved lazily
//!
//! A [`ConnectionRegistry`] holds named entries that are either live
//! connections or raw configuration. Resolving a configuration entry calls the
//! registered [`ConnectionFactory`] once and caches the result in place;
//! later resolutions of that name return the same connection.
//!
//! # Examples
//!
//! ```
//! use fraiseql_registry::{ConnectionConfig, ConnectionRegistry, FnFactory};
//! use std::sync::Arc;
//!
//! # fn main() -> fraiseql_registry::Result<()> {
//! struct Handle(String);
//!
//! let factory = FnFactory::new(|config: &ConnectionConfig| {
//!     Ok::<_, std::io::Error>(Handle(config.driver().unwrap_or("none").to_string()))
//! });
//!
//! let mut registry = ConnectionRegistry::with_factory(Arc::new(factory));
//! registry.add_connection("main", ConnectionConfig::new().setting("driver", "sqlite"))?;
//! registry.set_default_connection("main");
//!
//! let first = registry.connection(None)?;
//! let second = registry.connection(Some("main"))?;
//! assert!(Arc::ptr_eq(&first, &second));
//! assert_eq!(first.0, "sqlite");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod registry;

pub use config::{ConnectionConfig, RegistryConfig};
pub use error::{Error, FactoryError, Result};
pub use registry::{
    ConnectionFactory, ConnectionRegistry, EntryState, FnFactory, RegistryEntry,
    SharedConnectionRegistry, SharedFactory,
};
