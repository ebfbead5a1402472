//! Histogram metrics

use super::labels;

/// Record how long a factory call took
pub fn factory_duration(name: &str, duration_ms: u64) {
    ::metrics::histogram!(labels::FACTORY_DURATION_MS, labels::NAME => name.to_string())
        .record(duration_ms as f64);
}
