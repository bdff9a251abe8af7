//! Clock calibrated against a remote reference time.
//!
//! A client fetches the server's notion of "now" once (typically from a
//! status/info resource) and builds a [`SynchronizedClock`] from it. The clock
//! stores the offset between local wall-clock time and the reference, and
//! [`SynchronizedClock::now`] applies that offset to every later reading.
//!
//! This is a one-shot calibration. Drift after construction is not corrected,
//! which is good enough to align playback to within a second but not for
//! long-running precision timing.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;
use tracing::debug;

/// Naive layouts accepted after RFC 3339 and RFC 2822 fail. Interpreted as UTC.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Errors raised while calibrating a clock.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockError {
    /// The reference time string is not a recognisable timestamp.
    #[error("Parse error: invalid reference time {0:?}")]
    Parse(String),
}

/// Estimate of a remote reference clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynchronizedClock {
    /// `local_now - reference` at calibration, in milliseconds.
    offset_ms: i64,
}

impl SynchronizedClock {
    /// Calibrate against a reference timestamp string.
    ///
    /// Accepts RFC 3339 (`2026-10-15T09:30:00.250Z`), RFC 2822 / HTTP `Date`
    /// (`Sun, 06 Nov 1994 08:49:37 GMT`) and naive `YYYY-MM-DD HH:MM:SS[.fff]`
    /// (with a space or `T` separator) read as UTC.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Parse`] if the string matches none of them.
    pub fn new(reference_time: &str) -> Result<Self, ClockError> {
        let reference = parse_reference_time(reference_time)?;
        let clock = Self::calibrate(Utc::now().timestamp_millis(), reference.timestamp_millis());

        debug!(
            target: "common.clock",
            offset_ms = clock.offset_ms,
            "Clock calibrated against reference time"
        );

        Ok(clock)
    }

    /// Calibrate against a reference already expressed in milliseconds since
    /// the epoch.
    #[must_use]
    pub fn from_reference_millis(reference_ms: i64) -> Self {
        Self::calibrate(Utc::now().timestamp_millis(), reference_ms)
    }

    fn calibrate(local_now_ms: i64, reference_ms: i64) -> Self {
        Self {
            offset_ms: local_now_ms.saturating_sub(reference_ms),
        }
    }

    /// Current estimate of the reference clock, in milliseconds since the
    /// epoch.
    #[must_use]
    pub fn now(&self) -> i64 {
        Utc::now().timestamp_millis().saturating_sub(self.offset_ms)
    }

    /// [`Self::now`] as a UTC date-time, or `None` if it falls outside
    /// chrono's representable range.
    #[must_use]
    pub fn now_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.now()).single()
    }

    /// Local-minus-reference offset in milliseconds. Positive when the local
    /// clock runs ahead of the reference.
    #[must_use]
    pub const fn offset_ms(&self) -> i64 {
        self.offset_ms
    }
}

fn parse_reference_time(input: &str) -> Result<DateTime<Utc>, ClockError> {
    let trimmed = input.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    if let Ok(parsed) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| ClockError::Parse(input.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::SecondsFormat;

    /// Tolerance for wall-clock reads taken a few statements apart.
    const SLACK_MS: i64 = 50;

    #[test]
    fn test_reference_in_the_past_is_compensated() {
        let local_before = Utc::now();
        let reference = local_before - chrono::Duration::milliseconds(5000);
        let clock = SynchronizedClock::new(
            &reference.to_rfc3339_opts(SecondsFormat::Millis, true),
        )
        .unwrap();

        let expected = Utc::now().timestamp_millis() - 5000;
        assert!((clock.now() - expected).abs() <= SLACK_MS);
        assert!((clock.offset_ms() - 5000).abs() <= SLACK_MS);
    }

    #[test]
    fn test_reference_in_the_future_gives_negative_offset() {
        let reference = Utc::now() + chrono::Duration::seconds(30);
        let clock = SynchronizedClock::new(&reference.to_rfc3339()).unwrap();

        assert!((clock.offset_ms() + 30_000).abs() <= SLACK_MS);
        assert!(clock.now() > Utc::now().timestamp_millis());
    }

    #[test]
    fn test_calibrate_is_exact() {
        let clock = SynchronizedClock::calibrate(1_700_000_010_000, 1_700_000_000_000);
        assert_eq!(clock.offset_ms(), 10_000);
    }

    #[test]
    fn test_from_reference_millis() {
        let reference = Utc::now().timestamp_millis() - 1234;
        let clock = SynchronizedClock::from_reference_millis(reference);
        assert!((clock.offset_ms() - 1234).abs() <= SLACK_MS);
    }

    #[test]
    fn test_accepted_formats() {
        let expected = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();

        for input in [
            "1994-11-06T08:49:37Z",
            "1994-11-06T09:49:37+01:00",
            "Sun, 06 Nov 1994 08:49:37 GMT",
            "1994-11-06 08:49:37",
            "1994-11-06T08:49:37",
            "  1994-11-06T08:49:37.000Z  ",
        ] {
            assert_eq!(parse_reference_time(input).unwrap(), expected, "{input}");
        }
    }

    #[test]
    fn test_fractional_seconds_are_kept() {
        let parsed = parse_reference_time("2026-10-15 12:00:00.250").unwrap();
        assert_eq!(parsed.timestamp_millis() % 1000, 250);
    }

    #[test]
    fn test_invalid_reference_is_parse_error() {
        for input in ["", "yesterday", "2026-13-45T99:00:00Z", "1700000000"] {
            let err = SynchronizedClock::new(input).unwrap_err();
            assert_eq!(err, ClockError::Parse(input.to_string()));
            assert!(err.to_string().starts_with("Parse error"));
        }
    }

    #[test]
    fn test_now_utc_matches_now() {
        let clock = SynchronizedClock::from_reference_millis(Utc::now().timestamp_millis());
        let as_datetime = clock.now_utc().unwrap();
        assert!((as_datetime.timestamp_millis() - clock.now()).abs() <= SLACK_MS);
    }
}
