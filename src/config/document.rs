//! Registry documents
//!
//! A registry document names a set of connections and, optionally, the
//! default one:
//!
//! ```json
//! {
//!   "default": "main",
//!   "connections": {
//!     "main": { "driver": "sqlite", "path": ":memory:" },
//!     "replica": "postgres://reader@replica.internal/app"
//!   }
//! }
//! ```
//!
//! String values are parsed as connection strings; object values are used
//! as-is. Any other value is rejected when the document is turned into
//! registry entries.
//!
//! Reading the document from a file or the environment is left to the host;
//! this module only parses text it has already obtained.

use super::{value_kind, ConnectionConfig};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Named connections plus an optional default name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    /// Name resolved when no name is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Connection name to settings object or connection string
    #[serde(default)]
    pub connections: BTreeMap<String, Value>,
}

impl RegistryConfig {
    /// Parse a registry document from a JSON string
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Add a connection given as settings
    pub fn connection(mut self, name: impl Into<String>, config: ConnectionConfig) -> Self {
        self.connections
            .insert(name.into(), Value::Object(config.into_map()));
        self
    }

    /// Add a connection given as a connection string
    pub fn connection_url(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.connections
            .insert(name.into(), Value::String(url.into()));
        self
    }

    /// Set the default connection name
    pub fn default_connection(mut self, name: impl Into<String>) -> Self {
        self.default = Some(name.into());
        self
    }

    /// Convert every connection into configuration, in name order
    pub fn configs(&self) -> Result<Vec<(String, ConnectionConfig)>> {
        self.connections
            .iter()
            .map(|(name, value)| -> Result<(String, ConnectionConfig)> {
                Ok((name.clone(), config_from_value(name, value)?))
            })
            .collect()
    }
}

fn config_from_value(name: &str, value: &Value) -> Result<ConnectionConfig> {
    match value {
        Value::Object(settings) => Ok(ConnectionConfig::from_map(settings.clone())),
        Value::String(url) => ConnectionConfig::from_url(url),
        other => Err(Error::InvalidEntryKind {
            name: name.to_string(),
            kind: value_kind(other),
        }),
    }
}
