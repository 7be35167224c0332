//! Loopback servers for the monitor integration tests.
//!
//! [`rest_server`] starts a [`MockServer`] standing in for the recordings
//! REST API. [`accept_ws`] accepts one WebSocket client.

#![allow(dead_code)]

use std::time::Duration;

use pingview_channel::{ChannelConfig, RetryPolicy};
use pingview_monitor::RecordingsApi;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::{accept_async, WebSocketStream};
use url::Url;
use wiremock::{MockServer, ResponseTemplate};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn rest_server() -> (MockServer, RecordingsApi) {
    let server = MockServer::start().await;
    let api = RecordingsApi::new(Url::parse(&server.uri()).unwrap());
    (server, api)
}

/// A JSON answer with `status`.
pub fn json(status: u16, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_raw(body, "application/json")
}

pub async fn ws_listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    (listener, address)
}

pub async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = tokio::time::timeout(EVENT_TIMEOUT, listener.accept())
        .await
        .expect("no WebSocket client")
        .unwrap();
    accept_async(stream).await.expect("WebSocket handshake")
}

pub fn channel_config(delay_ms: u64, max_attempts: u32) -> ChannelConfig {
    ChannelConfig {
        retry: RetryPolicy {
            delay: Duration::from_millis(delay_ms),
            max_attempts,
            ..RetryPolicy::default()
        },
        ..ChannelConfig::default()
    }
}

pub async fn next_event<T: Clone>(events: &mut broadcast::Receiver<T>) -> T {
    tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}
