//! Counter metrics

use super::labels;
use crate::Error;

/// Record a successful resolution
pub fn connection_resolved(name: &str, source: &'static str) {
    ::metrics::counter!(
        labels::CONNECTIONS_RESOLVED,
        labels::NAME => name.to_string(),
        labels::SOURCE => source
    )
    .increment(1);
}

/// Record a factory invocation
pub fn factory_invoked(name: &str) {
    ::metrics::counter!(labels::FACTORY_INVOCATIONS, labels::NAME => name.to_string())
        .increment(1);
}

/// Record a failed resolution
///
/// Unregistered names come from callers, so they share one fixed label value.
pub fn resolution_error(name: &str, error: &Error) {
    ::metrics::counter!(
        labels::RESOLUTION_ERRORS,
        labels::NAME => error_name_label(name, error).to_string(),
        labels::CATEGORY => error.category()
    )
    .increment(1);
}

fn error_name_label<'a>(name: &'a str, error: &Error) -> &'a str {
    match error {
        Error::UnknownConnection(_) => labels::UNKNOWN_NAME,
        _ => name,
    }
}
