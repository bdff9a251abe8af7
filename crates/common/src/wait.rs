//! Cancellable sleep and wait-for-event.
//!
//! Both primitives follow the [`crate::abort`] contract: a cancelled token
//! resolves the wait with [`AbortError`]. Cancellation is observed as soon as
//! the token fires, not only when the timer expires.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::abort::{AbortError, WaitError};
use crate::event::EventSource;

/// Sleep for `duration` unless `token` is cancelled first.
///
/// A token that is already cancelled aborts without arming the timer. If the
/// timer and the cancellation become ready together, the cancellation wins.
///
/// # Errors
///
/// Returns [`AbortError`] if the token is or becomes cancelled before the
/// duration elapses.
pub async fn sleep(duration: Duration, token: &CancellationToken) -> Result<(), AbortError> {
    if token.is_cancelled() {
        return Err(AbortError);
    }

    tokio::select! {
        biased;
        () = token.cancelled() => {
            debug!(
                target: "common.wait",
                duration_ms = duration.as_millis(),
                "Sleep aborted"
            );
            Err(AbortError)
        }
        () = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Wait until `name` fires on `source`, unless `token` is cancelled first.
///
/// The listener is removed from `source` on every path: delivery,
/// cancellation, and drop of the returned future.
///
/// # Errors
///
/// Returns [`WaitError::Aborted`] if the token is or becomes cancelled first.
#[instrument(skip_all, name = "common.wait.event", fields(event = %name))]
pub async fn wait_for_event<T>(
    source: &EventSource<T>,
    name: &str,
    token: &CancellationToken,
) -> Result<T, WaitError> {
    if token.is_cancelled() {
        return Err(WaitError::Aborted(AbortError));
    }

    let listener = source.listen(name);

    tokio::select! {
        biased;
        // `source` is borrowed for the whole wait, so the registry outlives
        // the listener and `None` cannot occur here.
        payload = listener => payload.ok_or(WaitError::Abandoned),
        () = token.cancelled() => {
            debug!(target: "common.wait", event = %name, "Wait for event aborted");
            Err(WaitError::Aborted(AbortError))
        }
    }
}
