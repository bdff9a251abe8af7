//! Metrics definitions for the interleave tracker.
//!
//! All metrics follow Prometheus naming conventions:
//! - `ilv_` prefix
//! - `_total` suffix for counters
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `operation`: 4 values max (start, stop, add_data, poll)
//! - `reason`: 2 values (queue_full, queue_closed)
//!
//! Channels are deliberately not labelled; a process runs an unbounded number
//! of them over its lifetime.

use metrics::{counter, gauge};

/// Record one execution of the poll routine.
///
/// Metrics: `ilv_polls_total`, `ilv_window_bytes`
pub fn record_poll(window_bytes: u128) {
    counter!("ilv_polls_total").increment(1);
    // u128 to f64 conversion is fine for realistic window sizes (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("ilv_window_bytes").set(window_bytes as f64);
}

/// Record padding handed to the sink.
///
/// Metrics: `ilv_padding_events_total`, `ilv_padding_bytes_total`
pub fn record_padding(len: usize) {
    counter!("ilv_padding_events_total").increment(1);
    counter!("ilv_padding_bytes_total").increment(len as u64);
}

/// Record padding a sink could not enqueue.
///
/// Metric: `ilv_padding_dropped_total`
/// Labels: `reason`
pub fn record_padding_dropped(reason: &'static str) {
    counter!("ilv_padding_dropped_total", "reason" => reason).increment(1);
}

/// Record a run-state contract violation.
///
/// Metric: `ilv_precondition_violations_total`
/// Labels: `operation`
pub fn record_precondition_violation(operation: &'static str) {
    counter!("ilv_precondition_violations_total", "operation" => operation).increment(1);
}
