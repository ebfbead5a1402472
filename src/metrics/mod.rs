//! Metrics for registry observability
//!
//! Emitted through the `metrics` facade; nothing is recorded unless the host
//! installs a recorder.
//!
//! * `counters`: resolutions, factory invocations and resolution errors
//! * `histograms`: factory call duration
//! * `labels`: metric names and label values

pub mod counters;
pub mod histograms;
pub mod labels;
