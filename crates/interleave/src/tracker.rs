//! Interleave rate tracker.
//!
//! Keeps a sliding window of byte deliveries for one channel and, every half
//! window, tops the window up to the configured floor with padding.
//!
//! # Run-state
//!
//! ```text
//! Stopped --start()--> Running --stop()--> Stopped
//! ```
//!
//! `add_data` and polling are valid only while running. `stop()` discards the
//! whole history, so a restarted tracker pads the full floor on its first poll
//! unless real data arrives first.
//!
//! # Concurrency
//!
//! `start`, `stop` and `add_data` are synchronous and may be called from any
//! task. History and run-state sit behind one mutex shared with the poll task.
//! A poll computes its deficit under the lock, then releases it before
//! generating padding and calling the sink.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::config::TrackerConfig;
use crate::errors::{Operation, TrackerError};
use crate::observability::metrics;
use crate::padding::{generate_padding, RateFloor};
use crate::sink::PaddingSink;
use crate::window::{History, Sample};

/// Point-in-time view of a tracker, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerStats {
    pub running: bool,
    /// Bytes currently held in the history.
    pub window_bytes: u128,
    /// Samples currently held in the history.
    pub samples: usize,
    /// Poll routine executions since construction.
    pub polls: u64,
    /// Polls that handed padding to the sink.
    pub padding_events: u64,
    /// Padding bytes handed to the sink.
    pub padding_bytes: u64,
}

/// Enforces a minimum delivery rate on one channel.
pub struct InterleaveRateTracker {
    shared: Arc<Shared>,
}

struct Shared {
    config: TrackerConfig,
    floor: RateFloor,
    sink: Box<dyn PaddingSink>,
    state: Mutex<TrackerState>,
    polls: AtomicU64,
    padding_events: AtomicU64,
    padding_bytes: AtomicU64,
}

#[derive(Default)]
struct TrackerState {
    history: History,
    /// Cancels the poll task. `Some` exactly while running.
    poll_token: Option<CancellationToken>,
}

impl InterleaveRateTracker {
    /// Create a stopped tracker.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Configuration`] if `minimum_rate` is zero or
    /// `window` is shorter than one millisecond.
    pub fn new(
        sink: impl PaddingSink,
        minimum_rate: u64,
        window: Duration,
    ) -> Result<Self, TrackerError> {
        Self::from_config(sink, TrackerConfig::new(minimum_rate, window))
    }

    /// Create a stopped tracker from a loaded configuration.
    ///
    /// # Errors
    ///
    /// See [`TrackerConfig::validate`].
    pub fn from_config(sink: impl PaddingSink, config: TrackerConfig) -> Result<Self, TrackerError> {
        config.validate()?;

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                floor: RateFloor::new(config.minimum_rate, config.window),
                sink: Box::new(sink),
                state: Mutex::new(TrackerState::default()),
                polls: AtomicU64::new(0),
                padding_events: AtomicU64::new(0),
                padding_bytes: AtomicU64::new(0),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.shared.config
    }

    /// Start polling every half window on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a precondition violation if the tracker is already running, its
    /// history is not empty, or no runtime is available.
    pub fn start(&self) -> Result<(), TrackerError> {
        self.start_inner(CancellationToken::new())
    }

    /// Like [`start`](Self::start), but polling also halts when `parent` is
    /// cancelled. The tracker still reports running until [`stop`](Self::stop).
    ///
    /// # Errors
    ///
    /// Same as [`start`](Self::start).
    pub fn start_with_parent(&self, parent: &CancellationToken) -> Result<(), TrackerError> {
        self.start_inner(parent.child_token())
    }

    fn start_inner(&self, poll_token: CancellationToken) -> Result<(), TrackerError> {
        let Ok(runtime) = Handle::try_current() else {
            return Err(violation(Operation::Start, "no tokio runtime is running"));
        };

        let mut state = self.shared.lock_state();
        if state.poll_token.is_some() {
            return Err(violation(Operation::Start, "tracker is already running"));
        }
        if !state.history.is_empty() {
            return Err(violation(Operation::Start, "history is not empty"));
        }

        let period = self.shared.config.poll_period();
        let first_tick = Instant::now() + period;
        runtime.spawn(poll_loop(
            Arc::clone(&self.shared),
            poll_token.clone(),
            first_tick,
            period,
        ));
        state.poll_token = Some(poll_token);

        info!(
            target: "interleave.tracker",
            minimum_rate = self.shared.config.minimum_rate,
            window_ms = u64::try_from(self.shared.config.window.as_millis()).unwrap_or(u64::MAX),
            "Tracker started"
        );
        Ok(())
    }

    /// Stop polling and discard the history.
    ///
    /// # Errors
    ///
    /// Returns a precondition violation if the tracker is not running.
    pub fn stop(&self) -> Result<(), TrackerError> {
        let mut state = self.shared.lock_state();
        let Some(poll_token) = state.poll_token.take() else {
            return Err(violation(Operation::Stop, "tracker is not running"));
        };
        poll_token.cancel();
        let discarded = state.history.len();
        state.history.clear();
        drop(state);

        info!(
            target: "interleave.tracker",
            discarded_samples = discarded,
            "Tracker stopped"
        );
        Ok(())
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.lock_state().poll_token.is_some()
    }

    /// Record `size` bytes (real or padding) delivered to the channel now.
    ///
    /// # Errors
    ///
    /// Returns a precondition violation if the tracker is not running.
    pub fn add_data(&self, size: u64) -> Result<(), TrackerError> {
        let mut state = self.shared.lock_state();
        if state.poll_token.is_none() {
            return Err(violation(Operation::AddData, "tracker is not running"));
        }
        state.history.push(Sample {
            time: Instant::now(),
            size,
        });
        Ok(())
    }

    /// Run the poll routine once, outside the periodic schedule.
    ///
    /// Returns the padding length handed to the sink, 0 if the floor was met
    /// or polling has been halted by a parent token.
    ///
    /// # Errors
    ///
    /// Returns a precondition violation if the tracker is not running.
    pub fn poll_now(&self) -> Result<usize, TrackerError> {
        let poll_token = self.shared.lock_state().poll_token.clone();
        match poll_token {
            Some(token) => Ok(self.shared.poll(&token)),
            None => Err(violation(Operation::Poll, "tracker is not running")),
        }
    }

    #[must_use]
    pub fn stats(&self) -> TrackerStats {
        let state = self.shared.lock_state();
        TrackerStats {
            running: state.poll_token.is_some(),
            window_bytes: state.history.total_bytes(),
            samples: state.history.len(),
            polls: self.shared.polls.load(Ordering::Relaxed),
            padding_events: self.shared.padding_events.load(Ordering::Relaxed),
            padding_bytes: self.shared.padding_bytes.load(Ordering::Relaxed),
        }
    }
}

impl Drop for InterleaveRateTracker {
    fn drop(&mut self) {
        if let Some(poll_token) = self.shared.lock_state().poll_token.take() {
            poll_token.cancel();
        }
    }
}

impl fmt::Debug for InterleaveRateTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterleaveRateTracker")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Prune, measure, and pad. Returns the padding length emitted.
    fn poll(&self, poll_token: &CancellationToken) -> usize {
        let (window_bytes, padding_len) = {
            let mut state = self.lock_state();
            if poll_token.is_cancelled() {
                return 0;
            }
            if let Some(cutoff) = Instant::now().checked_sub(self.config.window) {
                state.history.prune_before(cutoff);
            }
            let window_bytes = state.history.total_bytes();
            (window_bytes, self.floor.padding_for(window_bytes))
        };

        self.polls.fetch_add(1, Ordering::Relaxed);
        metrics::record_poll(window_bytes);

        if padding_len == 0 {
            return 0;
        }

        let padding = generate_padding(padding_len);

        // stop() may have run while the lock was released.
        if poll_token.is_cancelled() {
            debug!(
                target: "interleave.padding",
                padding_len,
                "Tracker stopped during poll, discarding padding"
            );
            return 0;
        }

        self.padding_events.fetch_add(1, Ordering::Relaxed);
        self.padding_bytes
            .fetch_add(padding_len as u64, Ordering::Relaxed);
        metrics::record_padding(padding_len);

        debug!(
            target: "interleave.padding",
            window_bytes = u64::try_from(window_bytes).unwrap_or(u64::MAX),
            padding_len,
            "Emitting padding"
        );
        self.sink.send_padding(padding);
        padding_len
    }
}

#[instrument(skip_all, name = "interleave.tracker.poll")]
async fn poll_loop(
    shared: Arc<Shared>,
    poll_token: CancellationToken,
    first_tick: Instant,
    period: Duration,
) {
    debug!(
        target: "interleave.tracker",
        period_us = u64::try_from(period.as_micros()).unwrap_or(u64::MAX),
        "Poll task started"
    );

    let mut interval = interval_at(first_tick, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            () = poll_token.cancelled() => {
                break;
            }
            _ = interval.tick() => {
                shared.poll(&poll_token);
            }
        }
    }

    debug!(target: "interleave.tracker", "Poll task exiting");
}

fn violation(operation: Operation, reason: &'static str) -> TrackerError {
    error!(
        target: "interleave.tracker",
        operation = operation.as_str(),
        reason,
        "Precondition violation"
    );
    metrics::record_precondition_violation(operation.as_str());
    TrackerError::PreconditionViolation { operation, reason }
}
