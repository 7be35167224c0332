//! Recording session and recording file types.
//!
//! A recording session tracks whether a device is actively writing a
//! capture file on the server. The server reports sessions in three
//! places: the recording WebSocket (one session per frame, or a bulk
//! `AllRecordingStatus` array), and the REST recordings manager answers.

use serde::{Deserialize, Serialize};

use crate::types::{DeviceId, Timestamp};

/// Server-side state of one device's recording.
///
/// Only `device_id` is mandatory. Status frames sometimes carry a subset
/// of the fields (e.g. only `is_active`), so everything else defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSession {
    pub device_id: DeviceId,
    #[serde(default)]
    pub is_active: bool,
    /// Path of the capture file on the server, relative to its working dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Timestamp>,
    /// Device family, e.g. `Ping1D` or `Ping360`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
}

impl RecordingSession {
    /// A session carrying only a device id and an activity flag.
    pub fn new(device_id: impl Into<DeviceId>, is_active: bool) -> Self {
        Self {
            device_id: device_id.into(),
            is_active,
            file_path: None,
            start_time: None,
            device_type: None,
        }
    }

    /// File name component of [`file_path`](Self::file_path), if any.
    ///
    /// This is the name accepted by the REST download/delete endpoints.
    pub fn file_name(&self) -> Option<&str> {
        self.file_path
            .as_deref()
            .and_then(|path| path.rsplit(['/', '\\']).next())
            .filter(|name| !name.is_empty())
    }
}

/// One entry of the server's recordings directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingFileInfo {
    pub file_name: String,
    /// Size in bytes.
    pub file_size: u64,
    /// RFC 3339 modification time, or `"unknown"` when the server could
    /// not read it.
    pub modified: String,
}

impl RecordingFileInfo {
    /// Whether this is an MCAP capture (as opposed to another file the
    /// detailed listing may include).
    pub fn is_mcap(&self) -> bool {
        self.file_name.ends_with(".mcap")
    }
}
