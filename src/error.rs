//! Error types

use thiserror::Error;

/// Error produced by a [`ConnectionFactory`](crate::ConnectionFactory)
pub type FactoryError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Registry error
#[derive(Debug, Error)]
pub enum Error {
    /// Registered value is neither a live connection nor a configuration mapping
    #[error("invalid entry for connection '{name}': expected a connection or a configuration mapping, got {kind}")]
    InvalidEntryKind {
        /// Connection name
        name: String,
        /// Kind of the rejected value
        kind: &'static str,
    },

    /// No entry registered under the resolved name
    #[error("connection '{0}' is not registered")]
    UnknownConnection(String),

    /// A pending entry must be built but no factory was supplied
    #[error("no connection factory available to build connection '{name}'")]
    NoFactoryConfigured {
        /// Connection name
        name: String,
    },

    /// Error returned by the connection factory, passed through untouched
    #[error(transparent)]
    Factory(FactoryError),

    /// Malformed configuration input
    #[error("configuration error: {0}")]
    Config(String),

    /// Registry document could not be deserialized
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable label for this error, used in metrics
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidEntryKind { .. } => "invalid_entry_kind",
            Self::UnknownConnection(_) => "unknown_connection",
            Self::NoFactoryConfigured { .. } => "no_factory",
            Self::Factory(_) => "factory",
            Self::Config(_) => "config",
            Self::Json(_) => "json",
        }
    }

    /// Whether retrying the same resolution can succeed without changing the registry
    ///
    /// Only factory failures qualify: the entry stays pending and the factory
    /// is asked again on the next resolution.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Factory(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
