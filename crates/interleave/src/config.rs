//! Tracker configuration.
//!
//! Loaded from environment variables with defaults suitable for a voice-rate
//! channel.

use common::config::ConfigError;
use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::errors::TrackerError;

/// Default minimum rate in bytes per second.
pub const DEFAULT_MINIMUM_RATE: u64 = 32_000;

/// Default sliding window length in milliseconds.
pub const DEFAULT_WINDOW_MS: u64 = 2000;

/// Default depth of a bounded padding queue.
pub const DEFAULT_PADDING_QUEUE_DEPTH: usize = 64;

/// Interleave tracker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Floor on the delivery rate, in bytes per second.
    pub minimum_rate: u64,

    /// Sliding window the floor is enforced over. Only whole milliseconds
    /// count.
    pub window: Duration,

    /// Capacity of the bounded queue between the tracker and the transport.
    pub padding_queue_depth: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            minimum_rate: DEFAULT_MINIMUM_RATE,
            window: Duration::from_millis(DEFAULT_WINDOW_MS),
            padding_queue_depth: DEFAULT_PADDING_QUEUE_DEPTH,
        }
    }
}

impl TrackerConfig {
    #[must_use]
    pub fn new(minimum_rate: u64, window: Duration) -> Self {
        Self {
            minimum_rate,
            window,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`TrackerConfig::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// Unlike the service configs, unparseable numbers are rejected rather
    /// than silently defaulted: a mistyped floor would weaken the channel.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a non-numeric or zero value.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let minimum_rate = parse_var(vars, "INTERLEAVE_MIN_RATE_BYTES_PER_SEC")?
            .unwrap_or(DEFAULT_MINIMUM_RATE);

        let window_ms = parse_var(vars, "INTERLEAVE_WINDOW_MS")?.unwrap_or(DEFAULT_WINDOW_MS);

        let padding_queue_depth = parse_var(vars, "INTERLEAVE_PADDING_QUEUE_DEPTH")?
            .unwrap_or(DEFAULT_PADDING_QUEUE_DEPTH);

        let config = TrackerConfig {
            minimum_rate,
            window: Duration::from_millis(window_ms),
            padding_queue_depth,
        };

        config
            .validate()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        if padding_queue_depth == 0 {
            return Err(ConfigError::InvalidValue(
                "INTERLEAVE_PADDING_QUEUE_DEPTH must be positive".to_string(),
            ));
        }

        Ok(config)
    }

    /// Check the parameters the tracker depends on.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Configuration`] if the rate is zero or the window
    /// is shorter than one millisecond.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.minimum_rate == 0 {
            return Err(TrackerError::Configuration(
                "minimum rate must be positive".to_string(),
            ));
        }
        if self.window.as_millis() == 0 {
            return Err(TrackerError::Configuration(
                "window must be at least 1 ms".to_string(),
            ));
        }
        Ok(())
    }

    /// Interval between polls: half the window.
    #[must_use]
    pub fn poll_period(&self) -> Duration {
        self.window / 2
    }
}

fn parse_var<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    vars.get(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| {
                ConfigError::InvalidValue(format!("{key} must be a non-negative integer, got {raw:?}"))
            })
        })
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_from_vars_defaults() {
        let config = TrackerConfig::from_vars(&HashMap::new()).expect("defaults should load");

        assert_eq!(config, TrackerConfig::default());
        assert_eq!(config.minimum_rate, 32_000);
        assert_eq!(config.window, Duration::from_secs(2));
        assert_eq!(config.padding_queue_depth, 64);
    }

    #[test]
    fn test_from_vars_overrides() {
        let config = TrackerConfig::from_vars(&vars(&[
            ("INTERLEAVE_MIN_RATE_BYTES_PER_SEC", "1000"),
            ("INTERLEAVE_WINDOW_MS", " 500 "),
            ("INTERLEAVE_PADDING_QUEUE_DEPTH", "8"),
        ]))
        .unwrap();

        assert_eq!(config.minimum_rate, 1000);
        assert_eq!(config.window, Duration::from_millis(500));
        assert_eq!(config.padding_queue_depth, 8);
    }

    #[test]
    fn test_from_vars_rejects_garbage() {
        let err = TrackerConfig::from_vars(&vars(&[("INTERLEAVE_WINDOW_MS", "2s")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
        assert!(err.to_string().contains("INTERLEAVE_WINDOW_MS"));

        let err = TrackerConfig::from_vars(&vars(&[("INTERLEAVE_MIN_RATE_BYTES_PER_SEC", "-5")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_from_vars_rejects_zero() {
        for key in [
            "INTERLEAVE_MIN_RATE_BYTES_PER_SEC",
            "INTERLEAVE_WINDOW_MS",
            "INTERLEAVE_PADDING_QUEUE_DEPTH",
        ] {
            let result = TrackerConfig::from_vars(&vars(&[(key, "0")]));
            assert!(result.is_err(), "{key}=0 should be rejected");
        }
    }

    #[test]
    fn test_validate() {
        assert!(TrackerConfig::new(1, Duration::from_millis(1)).validate().is_ok());
        assert!(TrackerConfig::new(0, Duration::from_secs(1)).validate().is_err());
        assert!(TrackerConfig::new(1000, Duration::from_micros(999))
            .validate()
            .is_err());
    }

    #[test]
    fn test_poll_period_is_half_window() {
        assert_eq!(
            TrackerConfig::new(1000, Duration::from_millis(2000)).poll_period(),
            Duration::from_millis(1000)
        );
        assert_eq!(
            TrackerConfig::new(1000, Duration::from_millis(1)).poll_period(),
            Duration::from_micros(500)
        );
    }
}
