//! In-memory transport used by the channel integration tests.
//!
//! Every dial made through [`FakeConnector`] produces a [`FakeServer`]
//! handle on the receiver returned by [`fake_connector`]. The test pushes
//! frames through it; dropping it closes the connection from the "peer"
//! side.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pingview_channel::{ChannelEvent, Connector, SocketChannel, Transport, TransportError};
use tokio::sync::mpsc;
use url::Url;

#[derive(Clone)]
pub struct FakeConnector {
    inner: Arc<FakeInner>,
}

struct FakeInner {
    dials: AtomicUsize,
    refuse: AtomicBool,
    servers: mpsc::UnboundedSender<FakeServer>,
}

/// Peer side of one fake connection.
pub struct FakeServer {
    pub endpoint: Url,
    frames: mpsc::UnboundedSender<Result<String, TransportError>>,
    closed_by_client: Arc<AtomicBool>,
}

pub struct FakeTransport {
    frames: mpsc::UnboundedReceiver<Result<String, TransportError>>,
    closed_by_client: Arc<AtomicBool>,
}

pub fn fake_connector() -> (FakeConnector, mpsc::UnboundedReceiver<FakeServer>) {
    let (servers, rx) = mpsc::unbounded_channel();
    let connector = FakeConnector {
        inner: Arc::new(FakeInner {
            dials: AtomicUsize::new(0),
            refuse: AtomicBool::new(false),
            servers,
        }),
    };
    (connector, rx)
}

impl FakeConnector {
    /// Number of dials attempted so far, refused ones included.
    pub fn dials(&self) -> usize {
        self.inner.dials.load(Ordering::SeqCst)
    }

    /// Make subsequent dials fail.
    pub fn refuse(&self, refuse: bool) {
        self.inner.refuse.store(refuse, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Transport = FakeTransport;

    async fn connect(&self, endpoint: &Url) -> Result<FakeTransport, TransportError> {
        self.inner.dials.fetch_add(1, Ordering::SeqCst);
        if self.inner.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Connection("connection refused".into()));
        }

        let (frames, rx) = mpsc::unbounded_channel();
        let closed_by_client = Arc::new(AtomicBool::new(false));
        let server = FakeServer {
            endpoint: endpoint.clone(),
            frames,
            closed_by_client: Arc::clone(&closed_by_client),
        };
        let _ = self.inner.servers.send(server);

        Ok(FakeTransport {
            frames: rx,
            closed_by_client,
        })
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn next_text(&mut self) -> Option<Result<String, TransportError>> {
        self.frames.recv().await
    }

    async fn close(&mut self) {
        self.closed_by_client.store(true, Ordering::SeqCst);
        self.frames.close();
    }
}

impl FakeServer {
    pub fn send(&self, text: &str) {
        let _ = self.frames.send(Ok(text.to_string()));
    }

    /// Break the connection with a transport error.
    pub fn fail(&self, reason: &str) {
        let _ = self.frames.send(Err(TransportError::Protocol(reason.to_string())));
    }

    /// Whether the client closed its side (explicit close or dropped
    /// transport).
    pub fn client_gone(&self) -> bool {
        self.closed_by_client.load(Ordering::SeqCst) || self.frames.is_closed()
    }
}

/// Lifecycle and message events seen by a listener, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Seen {
    Connected,
    Disconnected,
    Message(serde_json::Value),
}

#[derive(Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Recorder {
    pub fn listener(&self) -> impl Fn(&ChannelEvent) + Send + Sync + 'static {
        let seen = Arc::clone(&self.seen);
        move |event: &ChannelEvent| {
            let entry = match event {
                ChannelEvent::Connected => Seen::Connected,
                ChannelEvent::Disconnected => Seen::Disconnected,
                ChannelEvent::Message(inbound) => Seen::Message(inbound.payload.clone()),
            };
            seen.lock().unwrap().push(entry);
        }
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self, wanted: &Seen) -> usize {
        self.seen().iter().filter(|s| *s == wanted).count()
    }
}

pub fn channel_with(connector: &FakeConnector) -> SocketChannel<FakeConnector> {
    SocketChannel::with_connector(connector.clone(), Default::default())
        .expect("tests run inside a tokio runtime")
}

/// Let spawned tasks run without reaching the reconnect delay.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Advance past one default reconnect delay.
pub async fn past_retry_delay() {
    tokio::time::sleep(Duration::from_millis(5_100)).await;
}
