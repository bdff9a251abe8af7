//! Named one-shot event notifications.
//!
//! An [`EventSource`] is the async counterpart of an event target: waiters
//! register a one-shot [`Listener`] for an event name and are woken with the
//! payload the next time that event is emitted. A listener deregisters itself
//! when dropped, so abandoned waits never leak subscriptions.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::trace;

struct Registry<T> {
    next_id: u64,
    listeners: HashMap<String, Vec<(u64, oneshot::Sender<T>)>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            listeners: HashMap::new(),
        }
    }
}

fn lock<T>(registry: &Mutex<Registry<T>>) -> MutexGuard<'_, Registry<T>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Source of named events carrying a `T` payload.
///
/// Cloning shares the same listener registry.
pub struct EventSource<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> EventSource<T> {
    /// Create an event source with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Register a one-shot listener for `name`.
    #[must_use]
    pub fn listen(&self, name: &str) -> Listener<T> {
        let (sender, receiver) = oneshot::channel();
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .listeners
            .entry(name.to_string())
            .or_default()
            .push((id, sender));

        Listener {
            receiver,
            registration: Registration {
                registry: Arc::downgrade(&self.registry),
                name: name.to_string(),
                id,
            },
        }
    }

    /// Number of listeners currently waiting on `name`.
    #[must_use]
    pub fn listener_count(&self, name: &str) -> usize {
        lock(&self.registry)
            .listeners
            .get(name)
            .map_or(0, Vec::len)
    }
}

impl<T: Clone> EventSource<T> {
    /// Deliver `payload` to every listener waiting on `name`.
    ///
    /// Listeners are one-shot and are removed by delivery. Returns how many
    /// listeners received the payload.
    pub fn emit(&self, name: &str, payload: T) -> usize {
        let waiting = lock(&self.registry)
            .listeners
            .remove(name)
            .unwrap_or_default();

        let delivered = waiting
            .into_iter()
            .map(|(_, sender)| sender.send(payload.clone()).is_ok())
            .filter(|&sent| sent)
            .count();

        trace!(
            target: "common.wait",
            event = %name,
            delivered,
            "Event emitted"
        );

        delivered
    }
}

impl<T> Default for EventSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for EventSource<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> std::fmt::Debug for EventSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = lock(&self.registry);
        f.debug_struct("EventSource")
            .field("events", &registry.listeners.len())
            .finish()
    }
}

struct Registration<T> {
    registry: Weak<Mutex<Registry<T>>>,
    name: String,
    id: u64,
}

impl<T> Drop for Registration<T> {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = lock(&registry);
        if let Some(waiting) = registry.listeners.get_mut(&self.name) {
            waiting.retain(|(id, _)| *id != self.id);
            if waiting.is_empty() {
                registry.listeners.remove(&self.name);
            }
        }
    }
}

/// A registered one-shot listener.
///
/// Resolves to `Some(payload)` when the event fires, or `None` if every
/// handle to the source was dropped first. Dropping the listener removes it
/// from the source.
pub struct Listener<T> {
    receiver: oneshot::Receiver<T>,
    registration: Registration<T>,
}

impl<T> Listener<T> {
    /// Name of the event this listener waits on.
    #[must_use]
    pub fn event_name(&self) -> &str {
        &self.registration.name
    }
}

impl<T> Future for Listener<T> {
    type Output = Option<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(Result::ok)
    }
}

impl<T> std::fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("event", &self.registration.name)
            .finish_non_exhaustive()
    }
}
