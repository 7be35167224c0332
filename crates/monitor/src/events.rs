//! Events emitted by the recording monitor.
//!
//! These are the high-level changes consumers care about, derived from
//! channel lifecycle notifications and recording-status frames.

use pingview_core::recording::RecordingSession;
use serde::Serialize;

/// A recording-level event from one ping-viewer server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MonitorEvent {
    /// The recording WebSocket opened.
    ChannelConnected,

    /// The recording WebSocket closed unexpectedly or failed to open.
    ChannelDisconnected {
        /// The channel has used up its automatic reconnects and stays
        /// down until the monitor is started again.
        retries_exhausted: bool,
    },

    /// A device began recording.
    RecordingStarted { session: RecordingSession },

    /// A device stopped recording.
    RecordingStopped { session: RecordingSession },

    /// A status update that did not change whether the device records.
    RecordingUpdated { session: RecordingSession },

    /// The whole session table was replaced from a bulk snapshot.
    StatusSynced { active: usize, total: usize },
}

impl MonitorEvent {
    /// Device the event is about, if it concerns a single device.
    pub fn device_id(&self) -> Option<&str> {
        match self {
            Self::RecordingStarted { session }
            | Self::RecordingStopped { session }
            | Self::RecordingUpdated { session } => Some(&session.device_id),
            _ => None,
        }
    }
}
