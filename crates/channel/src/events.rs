//! Events delivered to channel listeners and the channel's status.

use serde_json::Value;

use crate::messages::RecordingMessage;

/// Connection state of a [`SocketChannel`](crate::SocketChannel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No transport and no dial in progress.
    #[default]
    Disconnected,
    /// A transport is being opened.
    Connecting,
    /// The transport is open and frames are being read.
    Connected,
    /// The last transport failed to open or broke with an error. Behaves
    /// like `Disconnected` for every operation.
    Error,
}

impl ConnectionStatus {
    /// Whether a transport is open or being opened.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

/// A decoded inbound frame.
///
/// `payload` is the JSON exactly as received; `message` is its typed
/// classification.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub payload: Value,
    pub message: RecordingMessage,
}

impl InboundMessage {
    pub fn new(payload: Value) -> Self {
        let message = RecordingMessage::classify(&payload);
        Self { payload, message }
    }
}

/// What a listener is called with.
///
/// `Connected` and `Disconnected` carry no payload; consumers use them to
/// refresh their own state.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The transport opened.
    Connected,
    /// The transport closed unexpectedly (or failed to open).
    Disconnected,
    /// A well-formed JSON frame arrived.
    Message(InboundMessage),
}

impl ChannelEvent {
    /// The raw payload, for `Message` events.
    pub fn payload(&self) -> Option<&Value> {
        match self {
            Self::Message(inbound) => Some(&inbound.payload),
            _ => None,
        }
    }

    pub fn is_lifecycle(&self) -> bool {
        !matches!(self, Self::Message(_))
    }
}
