//! Observability for the interleave tracker.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `ilv_polls_total` | Counter | none | Poll routine executions |
//! | `ilv_window_bytes` | Gauge | none | Bytes in the window at the last poll |
//! | `ilv_padding_events_total` | Counter | none | Polls that emitted padding |
//! | `ilv_padding_bytes_total` | Counter | none | Padding bytes emitted |
//! | `ilv_padding_dropped_total` | Counter | `reason` | Padding a sink could not enqueue |
//! | `ilv_precondition_violations_total` | Counter | `operation` | Run-state contract violations |
//!
//! The exporter is installed by the hosting binary; without one the facade
//! calls are no-ops.

pub mod metrics;
