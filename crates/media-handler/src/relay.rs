//! Outbound relay.
//!
//! A synthetic media source stands in for an encoder, and the transport task
//! is the single writer of the outbound channel. It interleaves media chunks
//! with tracker padding and reports every write back to the tracker, so
//! padding counts toward later windows.

use bytes::Bytes;
use common::abort::cancellable;
use common::clock::SynchronizedClock;
use interleave::{InterleaveRateTracker, TrackerError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace};

/// Depth of the queue between the media source and the transport.
const MEDIA_QUEUE_DEPTH: usize = 16;

/// Relay error type.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Transport write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// Bytes written by the transport.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransportStats {
    pub media_bytes: u64,
    pub padding_bytes: u64,
}

/// Synthetic media source parameters.
#[derive(Debug, Clone)]
pub struct MediaSource {
    pub chunk_bytes: u64,
    pub interval: Duration,
    /// Alternating talk/silence period; zero means always talking.
    pub spurt: Duration,
    /// Stamps chunks with the server's playback time when present.
    pub clock: Option<SynchronizedClock>,
}

impl MediaSource {
    /// Whether the source is in a talk spurt `elapsed` after it started.
    #[must_use]
    pub fn is_talking(&self, elapsed: Duration) -> bool {
        let spurt_ms = self.spurt.as_millis();
        spurt_ms == 0 || (elapsed.as_millis() / spurt_ms) % 2 == 0
    }
}

/// Spawn the media source. Returns the chunk queue and a handle resolving to
/// the number of chunks produced.
pub fn spawn_media_source(
    source: MediaSource,
    cancel_token: CancellationToken,
) -> (mpsc::Receiver<Bytes>, JoinHandle<u64>) {
    let (sender, receiver) = mpsc::channel(MEDIA_QUEUE_DEPTH);
    let handle = tokio::spawn(run_media_source(source, sender, cancel_token));
    (receiver, handle)
}

#[instrument(skip_all, name = "mh.relay.media")]
async fn run_media_source(
    source: MediaSource,
    sender: mpsc::Sender<Bytes>,
    cancel_token: CancellationToken,
) -> u64 {
    let chunk_len = usize::try_from(source.chunk_bytes).unwrap_or(usize::MAX);
    let started = Instant::now();
    let mut chunks = 0u64;

    loop {
        if source.is_talking(started.elapsed()) {
            let chunk = Bytes::from(vec![0u8; chunk_len]);
            match cancellable(&cancel_token, sender.send(chunk)).await {
                Ok(Ok(())) => chunks += 1,
                // Transport gone or shutting down.
                Ok(Err(_)) | Err(_) => break,
            }
            if let Some(clock) = &source.clock {
                trace!(target: "mh.relay", playback_ms = clock.now(), "Media chunk queued");
            }
        }

        if common::wait::sleep(source.interval, &cancel_token)
            .await
            .is_err()
        {
            break;
        }
    }

    debug!(target: "mh.relay", chunks, "Media source stopped");
    chunks
}

/// Write media and padding to `writer` until `cancel_token` fires or both
/// queues close.
///
/// # Errors
///
/// Returns [`RelayError::Io`] if a write fails and [`RelayError::Tracker`] if
/// the tracker is stopped underneath the transport.
#[instrument(skip_all, name = "mh.relay.transport")]
pub async fn run_transport<W>(
    mut writer: W,
    tracker: Arc<InterleaveRateTracker>,
    mut media: mpsc::Receiver<Bytes>,
    mut padding: mpsc::Receiver<Bytes>,
    cancel_token: CancellationToken,
) -> Result<TransportStats, RelayError>
where
    W: AsyncWrite + Unpin,
{
    info!(target: "mh.relay", "Transport started");
    let mut stats = TransportStats::default();

    let mut media_open = true;
    let mut padding_open = true;

    while media_open || padding_open {
        tokio::select! {
            biased;

            () = cancel_token.cancelled() => break,
            chunk = media.recv(), if media_open => match chunk {
                Some(chunk) => {
                    writer.write_all(&chunk).await?;
                    tracker.add_data(chunk.len() as u64)?;
                    stats.media_bytes += chunk.len() as u64;
                }
                None => {
                    debug!(target: "mh.relay", "Media queue closed");
                    media_open = false;
                }
            },
            buf = padding.recv(), if padding_open => match buf {
                Some(buf) => {
                    writer.write_all(&buf).await?;
                    tracker.add_data(buf.len() as u64)?;
                    stats.padding_bytes += buf.len() as u64;
                }
                None => {
                    debug!(target: "mh.relay", "Padding queue closed");
                    padding_open = false;
                }
            },
        }
    }

    writer.flush().await?;
    info!(
        target: "mh.relay",
        media_bytes = stats.media_bytes,
        padding_bytes = stats.padding_bytes,
        "Transport stopped"
    );
    Ok(stats)
}
