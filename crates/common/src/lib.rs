//! Common utilities shared across Interleave components.
//!
//! The cancellable wait primitives ([`abort`], [`wait`], [`event`]) give
//! every blocking wait in the streaming runtime the same cancellation
//! contract. [`clock`] aligns local timing with a server's reference time.

#![warn(clippy::pedantic)]

/// Module for the cancellation-aware operation adapter and `AbortError`
pub mod abort;

/// Module for a clock calibrated against a remote reference time
pub mod clock;

/// Module for common configuration
pub mod config;

/// Module for named one-shot event sources
pub mod event;

/// Module for tracing subscriber setup
pub mod logging;

/// Module for cancellable sleep and wait-for-event
pub mod wait;
