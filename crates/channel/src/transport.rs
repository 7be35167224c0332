//! Transport seam between the channel state machine and the network.
//!
//! [`Connector`] dials an endpoint and yields a [`Transport`], which hands
//! out inbound text frames until the peer closes. The production pair is
//! [`WsConnector`] / [`WsTransport`] over `tokio-tungstenite`; tests plug in
//! in-memory implementations.

use async_trait::async_trait;
use futures::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

/// Opens transports to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    /// Dial `endpoint`. Resolves once the transport is open.
    async fn connect(&self, endpoint: &Url) -> Result<Self::Transport, TransportError>;
}

/// An open, message-oriented connection.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Next inbound text frame.
    ///
    /// `None` means the peer closed the connection cleanly; `Some(Err)`
    /// means it broke. Control and binary frames are consumed internally.
    async fn next_text(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the connection from our side. Errors are not reported.
    async fn close(&mut self);
}

/// Dials WebSocket endpoints (`ws://` and `wss://`).
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

/// A live WebSocket connection.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

#[async_trait]
impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, endpoint: &Url) -> Result<WsTransport, TransportError> {
        let (stream, _response) = connect_async(endpoint.as_str()).await.map_err(|e| {
            TransportError::Connection(format!("Failed to connect to {endpoint}: {e}"))
        })?;

        tracing::debug!(endpoint = %endpoint, "WebSocket handshake complete");
        Ok(WsTransport { stream })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn next_text(&mut self) -> Option<Result<String, TransportError>> {
        while let Some(msg_result) = self.stream.next().await {
            match msg_result {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(data)) => {
                    tracing::trace!(len = data.len(), "Ignoring binary frame");
                }
                Ok(Message::Ping(_) | Message::Pong(_)) => {
                    // Handled automatically by tungstenite.
                }
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "Peer closed WebSocket");
                    return None;
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => return Some(Err(TransportError::Protocol(e.to_string()))),
            }
        }
        None
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::trace!(error = %e, "Error while closing WebSocket");
        }
    }
}

/// Errors raised by a transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Failed to establish the connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an already-established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),
}
