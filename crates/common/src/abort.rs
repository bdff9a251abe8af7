//! Cancellation-aware operation adapter.
//!
//! Every blocking wait in the streaming runtime shares one cancellation
//! contract: a [`CancellationToken`] handed in by the caller can pre-empt the
//! wait, in which case the wait resolves with [`AbortError`]. Callers match on
//! the error *kind* ([`WaitError::is_abort`]), never on message text.
//!
//! Two adapters are provided:
//!
//! - [`cancellable`] races an arbitrary future against the token.
//! - [`cancellable_with`] wraps a callback-style operation: a setup function
//!   receives a [`Settle`] handle with `resolve` / `reject` and may register
//!   cleanup actions. Cleanup runs exactly once, whichever side wins the race
//!   and also when the adapter future itself is dropped.
//!
//! # Example
//!
//! ```rust,ignore
//! use common::abort::{cancellable_with, WaitError};
//! use tokio_util::sync::CancellationToken;
//!
//! let token = CancellationToken::new();
//! let result: Result<Bytes, WaitError<FetchError>> = cancellable_with(&token, |settle| {
//!     let request = client.start_fetch(url);
//!     let abort = request.abort_handle();
//!     settle.on_cleanup(move || abort.abort());
//!     request.on_complete(move |outcome| match outcome {
//!         Ok(body) => settle.resolve(body),
//!         Err(e) => settle.reject(e),
//!     });
//! })
//! .await;
//!
//! if let Err(e) = &result {
//!     if e.is_abort() {
//!         // unwind quietly
//!     }
//! }
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::trace;

// =============================================================================
// Error Types
// =============================================================================

/// Distinguished cancellation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("AbortError: the operation was aborted")]
pub struct AbortError;

impl AbortError {
    /// Name carried by every cancellation outcome.
    pub const NAME: &'static str = "AbortError";

    /// Returns `"AbortError"`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        Self::NAME
    }
}

/// Outcome of a cancellable wait that did not produce a value.
///
/// `E` is the operation-specific failure type. Waits that cannot fail on their
/// own use the default, [`Infallible`].
#[derive(Debug, Error)]
pub enum WaitError<E = Infallible> {
    /// The cancellation token fired before the operation settled.
    #[error(transparent)]
    Aborted(#[from] AbortError),

    /// The operation itself failed.
    #[error("Operation failed: {0}")]
    Failed(E),

    /// The operation dropped its completion handle without settling.
    #[error("Operation abandoned before settling")]
    Abandoned,
}

impl<E> WaitError<E> {
    /// Whether this outcome is a cancellation.
    #[must_use]
    pub const fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }
}

// =============================================================================
// Cleanup Registry
// =============================================================================

type CleanupAction = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct CleanupState {
    done: bool,
    actions: Vec<CleanupAction>,
}

/// Shared list of cleanup actions, drained exactly once.
#[derive(Clone, Default)]
struct CleanupList(Arc<Mutex<CleanupState>>);

impl CleanupList {
    fn push(&self, action: CleanupAction) {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if state.done {
            // Registered after the race was decided: run it now.
            drop(state);
            action();
        } else {
            state.actions.push(action);
        }
    }

    fn run(&self) {
        let actions = {
            let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
            state.done = true;
            mem::take(&mut state.actions)
        };

        if !actions.is_empty() {
            trace!(
                target: "common.wait",
                count = actions.len(),
                "Running cancellable operation cleanup"
            );
        }

        for action in actions {
            action();
        }
    }
}

/// Runs the cleanup list when the adapter future completes or is dropped.
struct CleanupGuard(CleanupList);

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.0.run();
    }
}

// =============================================================================
// Settle Handle
// =============================================================================

/// Completion handle given to the setup function of [`cancellable_with`].
///
/// Dropping it without calling [`Settle::resolve`] or [`Settle::reject`]
/// settles the wait with [`WaitError::Abandoned`].
pub struct Settle<T, E> {
    sender: oneshot::Sender<Result<T, E>>,
    cleanup: CleanupList,
}

impl<T, E> Settle<T, E> {
    /// Fulfil the operation. Has no effect if the wait already ended.
    pub fn resolve(self, value: T) {
        let _ = self.sender.send(Ok(value));
    }

    /// Fail the operation. Has no effect if the wait already ended.
    pub fn reject(self, error: E) {
        let _ = self.sender.send(Err(error));
    }

    /// Register an action to run exactly once when the wait ends, however it
    /// ends. If the wait already ended the action runs immediately.
    pub fn on_cleanup<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cleanup.push(Box::new(action));
    }

    /// Whether the waiting side is gone (aborted or dropped).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Returns a handle that registers cleanup without owning the right to
    /// settle.
    #[must_use]
    pub fn cleanup_handle(&self) -> CleanupHandle {
        CleanupHandle(self.cleanup.clone())
    }
}

impl<T, E> std::fmt::Debug for Settle<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settle")
            .field("closed", &self.sender.is_closed())
            .finish_non_exhaustive()
    }
}

/// Cleanup registration detached from a [`Settle`] handle.
#[derive(Clone)]
pub struct CleanupHandle(CleanupList);

impl CleanupHandle {
    /// See [`Settle::on_cleanup`].
    pub fn on_cleanup<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.0.push(Box::new(action));
    }
}

impl std::fmt::Debug for CleanupHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupHandle").finish_non_exhaustive()
    }
}

// =============================================================================
// Adapters
// =============================================================================

/// Race `operation` against `token`.
///
/// An already-cancelled token aborts without polling the operation. When the
/// token fires first the operation future is dropped. A completion that is
/// ready at the same time as the cancellation wins.
///
/// # Errors
///
/// Returns [`AbortError`] if the token is or becomes cancelled first.
pub async fn cancellable<F, T>(token: &CancellationToken, operation: F) -> Result<T, AbortError>
where
    F: Future<Output = T>,
{
    if token.is_cancelled() {
        return Err(AbortError);
    }

    tokio::select! {
        biased;
        value = operation => Ok(value),
        () = token.cancelled() => {
            trace!(target: "common.wait", "Cancellable operation aborted");
            Err(AbortError)
        }
    }
}

/// Run a callback-style operation under `token`.
///
/// `setup` is invoked synchronously with a [`Settle`] handle. The returned
/// future resolves with whichever of (settle, cancellation) happens first.
/// Cleanup registered through the handle runs exactly once.
///
/// # Errors
///
/// - [`WaitError::Aborted`] if the token is or becomes cancelled first
///   (`setup` is not invoked for an already-cancelled token)
/// - [`WaitError::Failed`] if the operation calls [`Settle::reject`]
/// - [`WaitError::Abandoned`] if the handle is dropped unsettled
pub async fn cancellable_with<T, E, S>(
    token: &CancellationToken,
    setup: S,
) -> Result<T, WaitError<E>>
where
    S: FnOnce(Settle<T, E>),
{
    let cleanup = CleanupList::default();
    let _guard = CleanupGuard(cleanup.clone());

    if token.is_cancelled() {
        return Err(WaitError::Aborted(AbortError));
    }

    let (sender, receiver) = oneshot::channel();
    setup(Settle { sender, cleanup });

    tokio::select! {
        biased;
        settled = receiver => match settled {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(WaitError::Failed(error)),
            Err(_) => Err(WaitError::Abandoned),
        },
        () = token.cancelled() => {
            trace!(target: "common.wait", "Cancellable operation aborted");
            Err(WaitError::Aborted(AbortError))
        }
    }
}
