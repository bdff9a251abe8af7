//! Media Handler
//!
//! Demo relay: streams synthetic media over a local sink while an interleave
//! tracker keeps the outbound channel at or above the configured floor rate.
//! Metrics are exposed for Prometheus on `MH_METRICS_BIND_ADDRESS`.

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use common::clock::SynchronizedClock;
use common::logging::init_tracing;
use interleave::{ChannelSink, InterleaveRateTracker};
use media_handler::config::Config;
use media_handler::relay::{run_transport, spawn_media_source, MediaSource};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    init_tracing(&config.observability).context("Failed to initialize tracing")?;

    info!(
        metrics_bind_address = %config.metrics_bind_address,
        minimum_rate = config.tracker.minimum_rate,
        window_ms = u64::try_from(config.tracker.window.as_millis()).unwrap_or(u64::MAX),
        media_chunk_bytes = config.media_chunk_bytes,
        "Starting Media Handler"
    );

    // Install the recorder before anything records a metric.
    let metrics_addr: SocketAddr = config
        .metrics_bind_address
        .parse()
        .with_context(|| format!("Invalid MH_METRICS_BIND_ADDRESS: {}", config.metrics_bind_address))?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| {
            error!(error = %e, "Failed to install Prometheus metrics exporter");
            e
        })
        .context("Failed to install Prometheus metrics exporter")?;
    info!(%metrics_addr, "Prometheus exporter listening");

    let clock = match config.reference_time.as_deref() {
        Some(reference) => {
            let clock = SynchronizedClock::new(reference).context("Invalid MH_REFERENCE_TIME")?;
            info!(offset_ms = clock.offset_ms(), "Playback clock calibrated");
            Some(clock)
        }
        None => None,
    };

    let shutdown_token = CancellationToken::new();

    let (sink, padding) = ChannelSink::channel(config.tracker.padding_queue_depth);
    let tracker = Arc::new(
        InterleaveRateTracker::from_config(sink, config.tracker)
            .context("Failed to create interleave tracker")?,
    );
    tracker
        .start_with_parent(&shutdown_token)
        .context("Failed to start interleave tracker")?;

    let (media, media_handle) = spawn_media_source(
        MediaSource {
            chunk_bytes: config.media_chunk_bytes,
            interval: config.media_interval,
            spurt: config.media_spurt,
            clock,
        },
        shutdown_token.child_token(),
    );

    let transport_handle = tokio::spawn(run_transport(
        tokio::io::sink(),
        Arc::clone(&tracker),
        media,
        padding,
        shutdown_token.child_token(),
    ));

    info!("Media Handler running - press Ctrl+C to shutdown");
    shutdown_signal().await.context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received, initiating graceful shutdown...");

    shutdown_token.cancel();

    let transport_stats = transport_handle
        .await
        .context("Transport task failed")?
        .context("Transport error")?;
    match media_handle.await {
        Ok(chunks) => info!(chunks, "Media source drained"),
        Err(e) => warn!(error = %e, "Media source task failed"),
    }

    let tracker_stats = tracker.stats();
    tracker.stop().context("Failed to stop interleave tracker")?;

    info!(
        media_bytes = transport_stats.media_bytes,
        padding_bytes = transport_stats.padding_bytes,
        polls = tracker_stats.polls,
        padding_events = tracker_stats.padding_events,
        "Media Handler shutdown complete"
    );
    Ok(())
}

/// Wait for Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())?
            .recv()
            .await;
        Ok::<(), std::io::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<std::io::Result<()>>();

    tokio::select! {
        result = signal::ctrl_c() => result,
        result = terminate => result,
    }
}
