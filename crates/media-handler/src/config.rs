//! Media Handler configuration.
//!
//! Configuration is loaded from environment variables. Tracker settings use
//! the `INTERLEAVE_*` variables read by [`TrackerConfig::from_vars`].

use common::config::{ConfigError, ObservabilityConfig};
use interleave::TrackerConfig;
use std::collections::HashMap;
use std::env;
use std::time::Duration;

/// Default Prometheus scrape endpoint bind address.
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:9464";

/// Default log filter when neither `MH_LOG_FILTER` nor `RUST_LOG` is set.
pub const DEFAULT_LOG_FILTER: &str = "media_handler=info,mh=info,interleave=info,common=info";

/// Default size of one synthetic media chunk (one RTP-sized payload).
pub const DEFAULT_MEDIA_CHUNK_BYTES: u64 = 1200;

/// Default interval between media chunks in milliseconds.
pub const DEFAULT_MEDIA_INTERVAL_MS: u64 = 20;

/// Default talk-spurt length in milliseconds (0 = always talking).
pub const DEFAULT_MEDIA_SPURT_MS: u64 = 0;

/// Media Handler configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Prometheus endpoint bind address (default: "0.0.0.0:9464").
    pub metrics_bind_address: String,

    /// Server reference time to calibrate playback timestamps against.
    pub reference_time: Option<String>,

    /// Bytes per synthetic media chunk.
    pub media_chunk_bytes: u64,

    /// Interval between media chunks.
    pub media_interval: Duration,

    /// Alternating talk/silence period. While silent, only padding flows.
    pub media_spurt: Duration,

    pub tracker: TrackerConfig,

    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let metrics_bind_address = vars
            .get("MH_METRICS_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_METRICS_BIND_ADDRESS.to_string());

        let reference_time = vars
            .get("MH_REFERENCE_TIME")
            .filter(|s| !s.trim().is_empty())
            .cloned();

        let media_chunk_bytes = vars
            .get("MH_MEDIA_CHUNK_BYTES")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MEDIA_CHUNK_BYTES);

        let media_interval_ms = vars
            .get("MH_MEDIA_INTERVAL_MS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_MEDIA_INTERVAL_MS);

        let media_spurt_ms = vars
            .get("MH_MEDIA_SPURT_MS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MEDIA_SPURT_MS);

        let tracker = TrackerConfig::from_vars(vars)?;
        let observability = ObservabilityConfig::from_vars(vars, "MH", DEFAULT_LOG_FILTER)?;

        Ok(Config {
            metrics_bind_address,
            reference_time,
            media_chunk_bytes,
            media_interval: Duration::from_millis(media_interval_ms),
            media_spurt: Duration::from_millis(media_spurt_ms),
            tracker,
            observability,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&HashMap::new()).expect("Config should load successfully");

        assert_eq!(config.metrics_bind_address, DEFAULT_METRICS_BIND_ADDRESS);
        assert_eq!(config.reference_time, None);
        assert_eq!(config.media_chunk_bytes, 1200);
        assert_eq!(config.media_interval, Duration::from_millis(20));
        assert_eq!(config.media_spurt, Duration::ZERO);
        assert_eq!(config.tracker, TrackerConfig::default());
        assert_eq!(config.observability.log_filter, DEFAULT_LOG_FILTER);
        assert!(config.observability.json_logs);
    }

    #[test]
    fn test_from_vars_custom_values() {
        let vars = HashMap::from([
            ("MH_METRICS_BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string()),
            ("MH_REFERENCE_TIME".to_string(), "2026-10-15T09:30:00Z".to_string()),
            ("MH_MEDIA_CHUNK_BYTES".to_string(), "160".to_string()),
            ("MH_MEDIA_INTERVAL_MS".to_string(), "40".to_string()),
            ("MH_MEDIA_SPURT_MS".to_string(), "3000".to_string()),
            ("INTERLEAVE_MIN_RATE_BYTES_PER_SEC".to_string(), "8000".to_string()),
            ("MH_JSON_LOGS".to_string(), "false".to_string()),
        ]);

        let config = Config::from_vars(&vars).unwrap();

        assert_eq!(config.metrics_bind_address, "127.0.0.1:9000");
        assert_eq!(config.reference_time.as_deref(), Some("2026-10-15T09:30:00Z"));
        assert_eq!(config.media_chunk_bytes, 160);
        assert_eq!(config.media_interval, Duration::from_millis(40));
        assert_eq!(config.media_spurt, Duration::from_secs(3));
        assert_eq!(config.tracker.minimum_rate, 8000);
        assert!(!config.observability.json_logs);
    }

    #[test]
    fn test_from_vars_invalid_numbers_use_defaults() {
        let vars = HashMap::from([
            ("MH_MEDIA_CHUNK_BYTES".to_string(), "lots".to_string()),
            ("MH_MEDIA_INTERVAL_MS".to_string(), "0".to_string()),
        ]);

        let config = Config::from_vars(&vars).unwrap();

        assert_eq!(config.media_chunk_bytes, DEFAULT_MEDIA_CHUNK_BYTES);
        assert_eq!(config.media_interval, Duration::from_millis(DEFAULT_MEDIA_INTERVAL_MS));
    }

    #[test]
    fn test_from_vars_rejects_invalid_tracker_settings() {
        let vars = HashMap::from([("INTERLEAVE_WINDOW_MS".to_string(), "soon".to_string())]);
        let err = Config::from_vars(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_blank_reference_time_is_ignored() {
        let vars = HashMap::from([("MH_REFERENCE_TIME".to_string(), "  ".to_string())]);
        assert_eq!(Config::from_vars(&vars).unwrap().reference_time, None);
    }
}
