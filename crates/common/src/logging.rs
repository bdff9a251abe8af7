//! Tracing subscriber initialisation.

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("Failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Install the global tracing subscriber described by `config`.
///
/// JSON output enables robust parsing by log shippers without brittle regex.
///
/// # Errors
///
/// Returns [`LoggingError::InvalidFilter`] for an unparsable filter and
/// [`LoggingError::Install`] if a global subscriber is already set.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_new(&config.log_filter)
        .map_err(|e| LoggingError::InvalidFilter(format!("{}: {e}", config.log_filter)))?;

    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    }
    .map_err(|e| LoggingError::Install(e.to_string()))
}
