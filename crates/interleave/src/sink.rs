//! Padding sinks.
//!
//! The tracker hands every padding buffer to a [`PaddingSink`] from its poll
//! task. Sinks run on the shared runtime and must not block: they enqueue the
//! buffer for the transport, which writes it and reports it back with
//! `add_data`. A buffer that cannot be enqueued is dropped; the next poll sees
//! the deficit again and pads again.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

use crate::observability::metrics;

/// Receiver of padding buffers.
pub trait PaddingSink: Send + Sync + 'static {
    /// Take ownership of one padding buffer. Must not block.
    fn send_padding(&self, padding: Bytes);
}

impl<F> PaddingSink for F
where
    F: Fn(Bytes) + Send + Sync + 'static,
{
    fn send_padding(&self, padding: Bytes) {
        self(padding);
    }
}

/// Sink that enqueues onto a bounded channel with `try_send`.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    #[must_use]
    pub fn new(sender: mpsc::Sender<Bytes>) -> Self {
        Self { sender }
    }

    /// Create a sink and the receiving end of its queue.
    #[must_use]
    pub fn channel(depth: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (sender, receiver) = mpsc::channel(depth.max(1));
        (Self { sender }, receiver)
    }
}

impl PaddingSink for ChannelSink {
    fn send_padding(&self, padding: Bytes) {
        match self.sender.try_send(padding) {
            Ok(()) => {}
            Err(TrySendError::Full(padding)) => {
                metrics::record_padding_dropped("queue_full");
                warn!(
                    target: "interleave.padding",
                    len = padding.len(),
                    "Padding queue full, dropping padding"
                );
            }
            Err(TrySendError::Closed(padding)) => {
                metrics::record_padding_dropped("queue_closed");
                warn!(
                    target: "interleave.padding",
                    len = padding.len(),
                    "Padding queue closed, dropping padding"
                );
            }
        }
    }
}

/// Sink that enqueues onto an unbounded channel.
#[derive(Debug, Clone)]
pub struct UnboundedChannelSink {
    sender: mpsc::UnboundedSender<Bytes>,
}

impl UnboundedChannelSink {
    #[must_use]
    pub fn new(sender: mpsc::UnboundedSender<Bytes>) -> Self {
        Self { sender }
    }

    /// Create a sink and the receiving end of its queue.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl PaddingSink for UnboundedChannelSink {
    fn send_padding(&self, padding: Bytes) {
        if let Err(e) = self.sender.send(padding) {
            metrics::record_padding_dropped("queue_closed");
            warn!(
                target: "interleave.padding",
                len = e.0.len(),
                "Padding queue closed, dropping padding"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink = move |padding: Bytes| seen_clone.lock().unwrap().push(padding.len());

        sink.send_padding(Bytes::from_static(&[0; 8]));
        sink.send_padding(Bytes::from_static(&[0; 4]));

        assert_eq!(*seen.lock().unwrap(), vec![8, 4]);
    }

    #[tokio::test]
    async fn test_channel_sink_enqueues() {
        let (sink, mut receiver) = ChannelSink::channel(2);
        sink.send_padding(Bytes::from_static(b"abcd"));

        assert_eq!(receiver.recv().await.unwrap(), Bytes::from_static(b"abcd"));
    }

    #[tokio::test]
    async fn test_channel_sink_drops_when_full() {
        let (sink, mut receiver) = ChannelSink::channel(1);
        sink.send_padding(Bytes::from_static(b"1111"));
        sink.send_padding(Bytes::from_static(b"2222"));

        assert_eq!(receiver.recv().await.unwrap(), Bytes::from_static(b"1111"));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_survives_closed_queue() {
        let (sink, receiver) = ChannelSink::channel(1);
        drop(receiver);
        sink.send_padding(Bytes::from_static(b"1111"));
    }

    #[tokio::test]
    async fn test_unbounded_sink() {
        let (sink, mut receiver) = UnboundedChannelSink::channel();
        for _ in 0..100 {
            sink.send_padding(Bytes::from_static(b"wxyz"));
        }
        drop(sink);

        let mut count = 0;
        while receiver.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 100);
    }
}
