//! Shared domain types for the pingview workspace.
//!
//! Everything here is plain data exchanged with a ping-viewer server:
//! recording sessions as reported over the recording WebSocket and the
//! REST recordings manager, and recording file listings.

pub mod recording;
pub mod types;
