//! Connection registry
//!
//! This module handles:
//! * Registry entries (live connections vs. pending configuration)
//! * The factory contract used to build pending entries
//! * Lazy, memoized resolution by name or default name
//! * A lock-guarded handle for multi-threaded hosts

mod entry;
mod factory;
mod resolver;
mod shared;

pub use entry::{EntryState, RegistryEntry};
pub use factory::{ConnectionFactory, FnFactory, SharedFactory};
pub use resolver::ConnectionRegistry;
pub use shared::SharedConnectionRegistry;
