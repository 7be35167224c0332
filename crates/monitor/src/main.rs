//! `pingview-monitor` -- recording-status daemon.
//!
//! Connects to a ping-viewer server's recording WebSocket, keeps the
//! recording session table in sync (refreshing over REST on every
//! connect), and logs each recording event until interrupted.
//!
//! # Environment variables
//!
//! | Variable                          | Required | Default          | Description                              |
//! |-----------------------------------|----------|------------------|------------------------------------------|
//! | `PINGVIEW_SERVER`                 | no       | `localhost:6060` | Server address, `host:port` or URL       |
//! | `PINGVIEW_WS_PATH`                | no       | `/ws/recording`  | Recording WebSocket path                 |
//! | `PINGVIEW_RECONNECT_DELAY_MS`     | no       | `5000`           | Delay before each automatic reconnect    |
//! | `PINGVIEW_MAX_RECONNECT_ATTEMPTS` | no       | `5`              | Automatic reconnects before giving up    |
//! | `PINGVIEW_BACKOFF`                | no       | `fixed`          | `fixed` or `exponential`                 |
//! | `PINGVIEW_REST_SYNC`              | no       | `true`           | Refresh sessions over REST on connect    |

use pingview_channel::SocketChannel;
use pingview_monitor::{MonitorConfig, MonitorEvent, RecordingMonitor, RecordingsApi};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pingview_monitor=info,pingview_channel=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MonitorConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    tracing::info!(
        server = %config.server,
        path = %config.channel.path,
        reconnect_delay_ms = config.channel.retry.delay.as_millis() as u64,
        max_reconnect_attempts = config.channel.retry.max_attempts,
        rest_sync = config.rest_sync,
        "Starting pingview-monitor",
    );

    let api = if config.rest_sync {
        match RecordingsApi::from_address(&config.server) {
            Ok(api) => Some(api),
            Err(e) => {
                tracing::error!(error = %e, "PINGVIEW_SERVER is not a valid server address");
                std::process::exit(1);
            }
        }
    } else {
        None
    };

    let monitor = SocketChannel::new(config.channel.clone())
        .map_err(pingview_monitor::MonitorError::from)
        .and_then(|channel| RecordingMonitor::new(channel, api))
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to create recording monitor");
            std::process::exit(1);
        });

    let mut events = monitor.subscribe();
    if let Err(e) = monitor.start(&config.server) {
        tracing::error!(error = %e, "Failed to start recording monitor");
        std::process::exit(1);
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
            received = events.recv() => match received {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event log fell behind");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    monitor.stop();
}

fn log_event(event: &MonitorEvent) {
    match event {
        MonitorEvent::ChannelConnected => tracing::info!("Connected to recording channel"),
        MonitorEvent::ChannelDisconnected { retries_exhausted } => {
            if *retries_exhausted {
                tracing::error!("Recording channel is down and no longer reconnecting");
            } else {
                tracing::warn!("Recording channel lost, reconnecting");
            }
        }
        MonitorEvent::RecordingStarted { session } => tracing::info!(
            device_id = %session.device_id,
            file = session.file_name().unwrap_or("-"),
            device_type = session.device_type.as_deref().unwrap_or("-"),
            "Recording started",
        ),
        MonitorEvent::RecordingStopped { session } => tracing::info!(
            device_id = %session.device_id,
            file = session.file_name().unwrap_or("-"),
            "Recording stopped",
        ),
        MonitorEvent::RecordingUpdated { session } => tracing::debug!(
            device_id = %session.device_id,
            is_active = session.is_active,
            "Recording status updated",
        ),
        MonitorEvent::StatusSynced { active, total } => {
            tracing::info!(active, total, "Recording sessions synced");
        }
    }
}
