//! Registry entries

use crate::config::{value_kind, ConnectionConfig};
use crate::{Error, Result};
use serde_json::Value;
use std::sync::Arc;

/// A registered connection: either already live or still configuration
pub enum RegistryEntry<C> {
    /// Constructed connection, returned as-is on resolution
    Live(Arc<C>),

    /// Configuration not yet turned into a connection
    Pending(ConnectionConfig),
}

/// Entry state, without the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    /// Configuration waiting for first resolution
    Pending,

    /// Live connection
    Live,
}

impl EntryState {
    /// Check if transition is valid
    ///
    /// The only transition is the one-way upgrade on first resolution.
    pub fn can_transition_to(&self, next: EntryState) -> bool {
        matches!((self, next), (EntryState::Pending, EntryState::Live))
    }
}

impl std::fmt::Display for EntryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Live => write!(f, "live"),
        }
    }
}

impl<C> RegistryEntry<C> {
    /// Wrap a constructed connection
    pub fn from_connection(connection: C) -> Self {
        Self::Live(Arc::new(connection))
    }

    /// Build an entry from an untyped value
    ///
    /// Only JSON objects are accepted, as pending configuration. A live
    /// connection can never arrive through this path.
    pub fn from_value(name: &str, value: Value) -> Result<Self> {
        match value {
            Value::Object(settings) => Ok(Self::Pending(ConnectionConfig::from_map(settings))),
            other => Err(Error::InvalidEntryKind {
                name: name.to_string(),
                kind: value_kind(&other),
            }),
        }
    }

    /// Current state
    pub fn state(&self) -> EntryState {
        match self {
            Self::Live(_) => EntryState::Live,
            Self::Pending(_) => EntryState::Pending,
        }
    }

    /// Whether the entry holds a live connection
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    /// The live connection, if any
    pub fn as_live(&self) -> Option<&Arc<C>> {
        match self {
            Self::Live(connection) => Some(connection),
            Self::Pending(_) => None,
        }
    }

    /// The pending configuration, if any
    pub fn as_pending(&self) -> Option<&ConnectionConfig> {
        match self {
            Self::Live(_) => None,
            Self::Pending(config) => Some(config),
        }
    }
}

impl<C> Clone for RegistryEntry<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Live(connection) => Self::Live(Arc::clone(connection)),
            Self::Pending(config) => Self::Pending(config.clone()),
        }
    }
}

// Connections are opaque, only the state is printed for them
impl<C> std::fmt::Debug for RegistryEntry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live(_) => f.write_str("RegistryEntry::Live(..)"),
            Self::Pending(config) => f.debug_tuple("RegistryEntry::Pending").field(config).finish(),
        }
    }
}

impl<C> From<ConnectionConfig> for RegistryEntry<C> {
    fn from(config: ConnectionConfig) -> Self {
        Self::Pending(config)
    }
}

impl<C> From<Arc<C>> for RegistryEntry<C> {
    fn from(connection: Arc<C>) -> Self {
        Self::Live(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Conn;

    #[test]
    fn test_only_pending_to_live() {
        assert!(EntryState::Pending.can_transition_to(EntryState::Live));
        assert!(!EntryState::Live.can_transition_to(EntryState::Pending));
        assert!(!EntryState::Live.can_transition_to(EntryState::Live));
        assert!(!EntryState::Pending.can_transition_to(EntryState::Pending));
    }

    #[test]
    fn test_from_value_object() {
        let entry = RegistryEntry::<Conn>::from_value("main", json!({"driver": "sqlite"})).unwrap();
        assert_eq!(entry.state(), EntryState::Pending);
        assert_eq!(entry.as_pending().unwrap().driver(), Some("sqlite"));
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        for (value, kind) in [
            (json!(null), "null"),
            (json!(true), "boolean"),
            (json!(3), "number"),
            (json!("postgres://localhost"), "string"),
            (json!([]), "array"),
        ] {
            let err = RegistryEntry::<Conn>::from_value("main", value).unwrap_err();
            match err {
                Error::InvalidEntryKind { name, kind: got } => {
                    assert_eq!(name, "main");
                    assert_eq!(got, kind);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn test_clone_shares_connection() {
        let entry = RegistryEntry::from_connection(Conn);
        let cloned = entry.clone();
        assert!(Arc::ptr_eq(
            entry.as_live().unwrap(),
            cloned.as_live().unwrap()
        ));
    }

    #[test]
    fn test_conversions() {
        let live: RegistryEntry<Conn> = Arc::new(Conn).into();
        assert!(live.is_live());

        let pending: RegistryEntry<Conn> = ConnectionConfig::new().into();
        assert!(!pending.is_live());
        assert!(pending.as_live().is_none());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(EntryState::Pending.to_string(), "pending");
        assert_eq!(EntryState::Live.to_string(), "live");
    }
}
