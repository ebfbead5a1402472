//! Connection configuration
//!
//! This module handles:
//! * The opaque settings mapping stored by pending registry entries
//! * Connection string parsing into settings
//! * Registry documents (named connections plus a default name)

mod connection_string;
mod document;

pub use document::RegistryConfig;

use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Setting keys that are never printed by `Debug`
const REDACTED_KEYS: &[&str] = &["password", "secret", "token"];

/// Connection configuration
///
/// An opaque mapping of settings (driver, host, credentials, ...) handed to a
/// [`ConnectionFactory`](crate::ConnectionFactory). The registry never looks
/// inside; interpreting the settings is the factory's job.
///
/// # Examples
///
/// ```
/// use fraiseql_registry::ConnectionConfig;
///
/// let config = ConnectionConfig::new()
///     .setting("driver", "postgres")
///     .setting("host", "localhost")
///     .setting("port", 5432);
///
/// assert_eq!(config.driver(), Some("postgres"));
/// assert_eq!(config.get("port").and_then(|v| v.as_u64()), Some(5432));
/// ```
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionConfig {
    settings: Map<String, Value>,
}

impl ConnectionConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing settings map
    pub fn from_map(settings: Map<String, Value>) -> Self {
        Self { settings }
    }

    /// Parse a connection string into settings
    ///
    /// Supports formats:
    /// * `driver://[user[:password]@][host][:port][/database][?key=value&...]`
    /// * `sqlite::memory:`, `sqlite:///path/to/file.db`, `sqlite:relative.db`
    ///
    /// The scheme becomes the `driver` setting and every query parameter is
    /// kept as a string setting. User, password, database and query values are
    /// percent-decoded. Settings absent from the string are left unset.
    pub fn from_url(url: &str) -> Result<Self> {
        connection_string::parse(url)
    }

    /// Add a setting
    pub fn setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Insert a setting, returning the previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.settings.insert(key.into(), value.into())
    }

    /// Get a setting
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    /// Get a setting holding a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(Value::as_str)
    }

    /// Driver name (`driver` setting)
    pub fn driver(&self) -> Option<&str> {
        self.get_str("driver")
    }

    /// Whether a setting is present
    pub fn contains(&self, key: &str) -> bool {
        self.settings.contains_key(key)
    }

    /// Number of settings
    pub fn len(&self) -> usize {
        self.settings.len()
    }

    /// Whether there are no settings
    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Iterate over settings
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.settings.iter()
    }

    /// Borrow the underlying map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.settings
    }

    /// Take the underlying map
    pub fn into_map(self) -> Map<String, Value> {
        self.settings
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.settings {
            if REDACTED_KEYS.contains(&key.as_str()) {
                map.entry(key, &"<redacted>");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

impl From<Map<String, Value>> for ConnectionConfig {
    fn from(settings: Map<String, Value>) -> Self {
        Self::from_map(settings)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ConnectionConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            settings: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Human-readable name of a JSON value's kind
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
