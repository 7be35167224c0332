//! Resilient WebSocket channel for ping-viewer recording status.
//!
//! Provides endpoint derivation, a transport seam over
//! `tokio-tungstenite`, a bounded retry policy, typed decoding of status
//! frames, and [`SocketChannel`]: a single-connection WebSocket wrapper
//! with a listener set and automatic reconnection.

pub mod channel;
pub mod endpoint;
pub mod events;
pub mod messages;
pub mod processor;
pub mod reconnect;
pub mod transport;

pub use channel::{ChannelConfig, ChannelError, ListenerId, SocketChannel, Subscription};
pub use events::{ChannelEvent, ConnectionStatus, InboundMessage};
pub use messages::RecordingMessage;
pub use reconnect::{Backoff, RetryPolicy};
pub use transport::{Connector, Transport, TransportError, WsConnector, WsTransport};
