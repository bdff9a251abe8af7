//! Media Handler library.
//!
//! A demo relay for the interleave tracker: a synthetic media source and a
//! single-writer transport that keeps the outbound channel above the
//! configured floor rate.

#![warn(clippy::pedantic)]

/// Module for Media Handler configuration
pub mod config;

/// Module for the media source and transport tasks
pub mod relay;
