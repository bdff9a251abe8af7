//! Minimum-interleave-rate flow control.
//!
//! An [`InterleaveRateTracker`] guarantees that an outbound channel never
//! delivers fewer bytes than a configured floor rate within any recent
//! sliding window. It watches every byte written to the channel and, twice
//! per window, hands the transport enough non-compressible padding to make up
//! whatever real payload fell short of the floor.
//!
//! ```no_run
//! use interleave::{ChannelSink, InterleaveRateTracker};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), interleave::TrackerError> {
//! let (sink, mut padding) = ChannelSink::channel(64);
//! let tracker = InterleaveRateTracker::new(sink, 32_000, Duration::from_secs(2))?;
//! tracker.start()?;
//!
//! // Transport: write real data and padding, report every write.
//! tracker.add_data(1200)?;
//! if let Some(buf) = padding.recv().await {
//!     tracker.add_data(buf.len() as u64)?;
//! }
//!
//! tracker.stop()?;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]

/// Module for tracker configuration
pub mod config;

/// Module for tracker error types
pub mod errors;

/// Module for metrics
pub mod observability;

/// Module for floor arithmetic and padding generation
pub mod padding;

/// Module for padding sinks
pub mod sink;

/// Module for the rate tracker
pub mod tracker;

/// Module for the delivery history
pub mod window;

pub use config::TrackerConfig;
pub use errors::{Operation, TrackerError};
pub use sink::{ChannelSink, PaddingSink, UnboundedChannelSink};
pub use tracker::{InterleaveRateTracker, TrackerStats};
