//! Metric names and label values

/// Successful resolutions, labelled by `name` and `source`
pub const CONNECTIONS_RESOLVED: &str = "fraiseql_registry_connections_resolved_total";
/// Factory invocations, labelled by `name`
pub const FACTORY_INVOCATIONS: &str = "fraiseql_registry_factory_invocations_total";
/// Failed resolutions, labelled by `name` and `category`
pub const RESOLUTION_ERRORS: &str = "fraiseql_registry_resolution_errors_total";
/// Factory call duration in milliseconds, labelled by `name`
pub const FACTORY_DURATION_MS: &str = "fraiseql_registry_factory_duration_ms";

/// Label: connection name
pub const NAME: &str = "name";
/// Label: where a resolved connection came from
pub const SOURCE: &str = "source";
/// Label: error category
pub const CATEGORY: &str = "category";

/// `name` label value for resolutions of unregistered names
pub const UNKNOWN_NAME: &str = "<unknown>";

/// Resolved from an already-live entry
pub const SOURCE_CACHE: &str = "cache";
/// Resolved by building a pending entry
pub const SOURCE_FACTORY: &str = "factory";
