//! Shared observability configuration.

use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directive string (e.g. `media_handler=info,interleave=debug`).
    pub log_filter: String,
    /// Emit JSON-formatted logs instead of the human-readable format.
    pub json_logs: bool,
}

impl ObservabilityConfig {
    /// Read log configuration.
    ///
    /// The filter comes from `{prefix}_LOG_FILTER`, then `RUST_LOG`, then
    /// `default_filter`. JSON output is on unless `{prefix}_JSON_LOGS` says
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `{prefix}_JSON_LOGS` is not a
    /// boolean.
    pub fn from_vars(
        vars: &HashMap<String, String>,
        prefix: &str,
        default_filter: &str,
    ) -> Result<Self, ConfigError> {
        let log_filter = vars
            .get(&format!("{prefix}_LOG_FILTER"))
            .or_else(|| vars.get("RUST_LOG"))
            .cloned()
            .unwrap_or_else(|| default_filter.to_string());

        let json_key = format!("{prefix}_JSON_LOGS");
        let json_logs = match vars.get(&json_key) {
            Some(value) => parse_bool(value).ok_or_else(|| {
                ConfigError::InvalidValue(format!("{json_key} must be true or false, got {value:?}"))
            })?,
            None => true,
        };

        Ok(Self {
            log_filter,
            json_logs,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
