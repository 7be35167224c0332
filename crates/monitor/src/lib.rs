//! Recording-status monitoring for ping-viewer servers.
//!
//! Builds on [`pingview_channel`]: a [`RecordingMonitor`] keeps a table of
//! recording sessions in sync with a server's recording WebSocket and
//! REST recordings manager, and broadcasts [`MonitorEvent`]s.

pub mod api;
pub mod config;
pub mod events;
pub mod manager;
pub mod sessions;

pub use api::{RecordingsApi, RecordingsApiError};
pub use config::{ConfigError, MonitorConfig};
pub use events::MonitorEvent;
pub use manager::{MonitorError, RecordingMonitor};
pub use sessions::{SessionTable, SyncMark};
