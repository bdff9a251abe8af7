//! Interleave tracker error types.
//!
//! Contract violations (`start`/`stop`/`add_data` in the wrong run-state) are
//! programming errors. They are logged at `error` level and returned to the
//! caller rather than absorbed; nothing in this crate retries them.

use thiserror::Error;

/// Operations guarded by a run-state precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start,
    Stop,
    AddData,
    Poll,
}

impl Operation {
    /// Returns the operation name for log fields and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::AddData => "add_data",
            Operation::Poll => "poll",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interleave tracker error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// Invalid construction parameters.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An operation was called in the wrong run-state.
    #[error("Precondition violation in {operation}(): {reason}")]
    PreconditionViolation {
        operation: Operation,
        reason: &'static str,
    },
}

impl TrackerError {
    /// Whether this error is a run-state contract violation.
    #[must_use]
    pub const fn is_precondition_violation(&self) -> bool {
        matches!(self, TrackerError::PreconditionViolation { .. })
    }
}
