//! The resilient socket channel.
//!
//! [`SocketChannel`] keeps at most one live transport to one server,
//! fans inbound frames and lifecycle events out to a set of listeners,
//! and recovers from drops on its own:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected
//!      ^              |                          |
//!      |            Error ----------------------+|
//!      |                                         v
//!      +---- retry after delay (attempts < max) -+
//! ```
//!
//! All public operations are synchronous: they update state under a short
//! lock and spawn the dial, read and retry tasks on the runtime captured
//! at construction. Listeners are always called with no lock held, so a
//! listener may add or remove listeners, or connect/disconnect the channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::endpoint::{websocket_endpoint, EndpointError, DEFAULT_RECORDING_PATH};
use crate::events::{ChannelEvent, ConnectionStatus};
use crate::processor::{decode_frame, dispatch, Listener};
use crate::reconnect::RetryPolicy;
use crate::transport::{Connector, Transport, WsConnector};

/// Injected configuration for a channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket path appended to the server's host and port.
    pub path: String,
    pub retry: RetryPolicy,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_RECORDING_PATH.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Handle identifying one listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// A single logical WebSocket connection with automatic reconnection.
///
/// Cloning yields another handle to the same channel. Dropping the last
/// handle closes the transport and cancels any scheduled reconnect, like
/// [`disconnect`](Self::disconnect). A listener that captures a handle
/// keeps the channel alive until it is removed.
pub struct SocketChannel<C: Connector = WsConnector> {
    owner: Arc<Owner<C>>,
}

impl<C: Connector> Clone for SocketChannel<C> {
    fn clone(&self) -> Self {
        Self {
            owner: Arc::clone(&self.owner),
        }
    }
}

/// Shared by every [`SocketChannel`] handle. Spawned tasks hold only the
/// [`Inner`], so this drops with the last handle.
struct Owner<C: Connector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Drop for Owner<C> {
    fn drop(&mut self) {
        self.inner.shut_down();
    }
}

struct Inner<C: Connector> {
    connector: C,
    config: ChannelConfig,
    runtime: Handle,
    state: Mutex<State>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener_id: AtomicU64,
}

#[derive(Default)]
struct State {
    /// Address as given by the caller.
    target: Option<String>,
    endpoint: Option<Url>,
    status: ConnectionStatus,
    /// Automatic attempts since the last user-initiated connect.
    attempts: u32,
    /// Bumped on every dial and on disconnect. Tasks carrying an older
    /// value belong to a superseded session and must not touch state.
    generation: u64,
    session: Option<CancellationToken>,
    pending_retry: Option<CancellationToken>,
}

impl State {
    fn cancel_tasks(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel();
        }
        if let Some(retry) = self.pending_retry.take() {
            retry.cancel();
        }
    }
}

impl SocketChannel<WsConnector> {
    /// Create a WebSocket channel. Must be called from within a Tokio
    /// runtime; the channel spawns its tasks there.
    pub fn new(config: ChannelConfig) -> Result<Self, ChannelError> {
        Self::with_connector(WsConnector, config)
    }
}

impl<C: Connector> SocketChannel<C> {
    /// Create a channel that dials through `connector`.
    pub fn with_connector(connector: C, config: ChannelConfig) -> Result<Self, ChannelError> {
        let runtime = Handle::try_current().map_err(|_| ChannelError::NoRuntime)?;
        Ok(Self::with_runtime(connector, config, runtime))
    }

    /// Create a channel whose tasks run on `runtime`.
    pub fn with_runtime(connector: C, config: ChannelConfig, runtime: Handle) -> Self {
        let inner = Arc::new(Inner {
            connector,
            config,
            runtime,
            state: Mutex::new(State::default()),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
        });
        Self {
            owner: Arc::new(Owner { inner }),
        }
    }

    /// Connect to the server at `address` (`host:port` or `http(s)://...`).
    ///
    /// Does nothing if the channel is already connected, to any address.
    /// Otherwise replaces any existing session, resets the attempt counter
    /// and dials. Listeners receive [`ChannelEvent::Connected`] once the
    /// transport opens.
    pub fn connect(&self, address: &str) -> Result<(), ChannelError> {
        let mut state = self.inner().state();
        if state.status == ConnectionStatus::Connected {
            tracing::debug!(address, "Channel already connected, ignoring connect");
            return Ok(());
        }

        let endpoint = self.inner().resolve(address)?;
        state.target = Some(address.to_string());
        state.endpoint = Some(endpoint);
        state.attempts = 0;
        self.inner().dial(&mut state);
        Ok(())
    }

    /// Remember `address` without dialing.
    ///
    /// The next [`add_listener`](Self::add_listener) connects lazily.
    pub fn set_target(&self, address: &str) -> Result<(), ChannelError> {
        let endpoint = self.inner().resolve(address)?;
        let mut state = self.inner().state();
        state.target = Some(address.to_string());
        state.endpoint = Some(endpoint);
        Ok(())
    }

    /// Close the transport, cancel any scheduled reconnect, and forget the
    /// target. Listeners are not notified.
    pub fn disconnect(&self) {
        let mut state = self.inner().state();
        state.cancel_tasks();
        state.generation += 1;
        state.target = None;
        state.endpoint = None;
        state.attempts = 0;
        state.status = ConnectionStatus::Disconnected;
        tracing::info!("Channel disconnected");
    }

    /// Register a listener.
    ///
    /// If a target is known and no transport is open or opening, this
    /// also connects to it.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner().next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.inner().listeners().push((id, Arc::new(listener)));

        let mut state = self.inner().state();
        if state.endpoint.is_some() && !state.status.is_open() {
            tracing::debug!(listener = id.0, "Listener added to idle channel, connecting");
            state.attempts = 0;
            self.inner().dial(&mut state);
        }
        id
    }

    /// Deregister a listener. Returns `false` if `id` was not registered.
    ///
    /// Removing the last listener disconnects the channel.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let now_empty = {
            let mut listeners = self.inner().listeners();
            let before = listeners.len();
            listeners.retain(|(lid, _)| *lid != id);
            if listeners.len() == before {
                return false;
            }
            listeners.is_empty()
        };

        if now_empty {
            tracing::debug!("Last listener removed");
            self.disconnect();
        }
        true
    }

    /// Register a listener that is removed when the returned guard drops.
    pub fn subscribe<F>(&self, listener: F) -> Subscription<C>
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        let id = self.add_listener(listener);
        Subscription {
            channel: self.clone(),
            id,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner().state().status
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Automatic reconnects made since the last user-initiated connect.
    pub fn attempts(&self) -> u32 {
        self.inner().state().attempts
    }

    pub fn target(&self) -> Option<String> {
        self.inner().state().target.clone()
    }

    pub fn endpoint(&self) -> Option<Url> {
        self.inner().state().endpoint.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.inner().listeners().len()
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.inner().config
    }

    /// Whether the channel has given up reconnecting and stays down until
    /// the next explicit [`connect`](Self::connect).
    pub fn retries_exhausted(&self) -> bool {
        let state = self.inner().state();
        state.target.is_some()
            && !state.status.is_open()
            && state.pending_retry.is_none()
            && !self.inner().config.retry.allows(state.attempts)
    }
}

impl<C: Connector> SocketChannel<C> {
    fn inner(&self) -> &Arc<Inner<C>> {
        &self.owner.inner
    }
}

impl<C: Connector> Inner<C> {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<(ListenerId, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop the session and any pending retry once no handle remains.
    fn shut_down(&self) {
        let mut state = self.state();
        if state.session.is_none() && state.pending_retry.is_none() {
            return;
        }
        state.cancel_tasks();
        state.generation += 1;
        state.status = ConnectionStatus::Disconnected;
        tracing::info!("Last channel handle dropped, channel closed");
    }

    fn resolve(&self, address: &str) -> Result<Url, ChannelError> {
        websocket_endpoint(address, &self.config.path).map_err(|e| {
            tracing::warn!(address, error = %e, "Rejecting server address");
            ChannelError::InvalidAddress(e)
        })
    }

    fn notify(&self, event: &ChannelEvent) {
        let snapshot: Vec<Listener> = self
            .listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        dispatch(&snapshot, event);
    }

    /// Tear down the current session and open a new one to the stored
    /// endpoint.
    fn dial(self: &Arc<Self>, state: &mut State) {
        state.cancel_tasks();
        let Some(endpoint) = state.endpoint.clone() else {
            return;
        };

        state.generation += 1;
        state.status = ConnectionStatus::Connecting;
        let cancel = CancellationToken::new();
        state.session = Some(cancel.clone());

        let inner = Arc::clone(self);
        let generation = state.generation;
        self.runtime
            .spawn(async move { inner.run_session(generation, endpoint, cancel).await });
    }

    /// Drive one transport: open -> read frames -> close.
    async fn run_session(self: Arc<Self>, generation: u64, endpoint: Url, cancel: CancellationToken) {
        tracing::info!(endpoint = %endpoint, generation, "Opening channel transport");

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = self.connector.connect(&endpoint) => result,
        };

        let mut transport = match opened {
            Ok(transport) => transport,
            Err(e) => {
                tracing::warn!(endpoint = %endpoint, error = %e, "Channel transport failed to open");
                self.on_closed(generation, ConnectionStatus::Error);
                return;
            }
        };

        if !self.mark_connected(generation) {
            transport.close().await;
            return;
        }
        tracing::info!(endpoint = %endpoint, "Channel connected");
        self.notify(&ChannelEvent::Connected);

        let end_status = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    transport.close().await;
                    return;
                }
                next = transport.next_text() => next,
            };

            match next {
                Some(Ok(text)) => {
                    for message in decode_frame(&text) {
                        // A listener may disconnect mid-frame.
                        if cancel.is_cancelled() {
                            break;
                        }
                        self.notify(&ChannelEvent::Message(message));
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(endpoint = %endpoint, error = %e, "Channel transport error");
                    break ConnectionStatus::Error;
                }
                None => {
                    tracing::info!(endpoint = %endpoint, "Channel closed by peer");
                    break ConnectionStatus::Disconnected;
                }
            }
        };

        self.on_closed(generation, end_status);
    }

    fn mark_connected(&self, generation: u64) -> bool {
        let mut state = self.state();
        if state.generation != generation {
            return false;
        }
        state.status = ConnectionStatus::Connected;
        true
    }

    /// Handle an unexpected close of session `generation`: notify
    /// listeners, then maybe schedule a reconnect.
    fn on_closed(self: &Arc<Self>, generation: u64, status: ConnectionStatus) {
        {
            let mut state = self.state();
            if state.generation != generation {
                return;
            }
            state.session = None;
            state.status = status;
        }

        self.notify(&ChannelEvent::Disconnected);
        self.schedule_retry(generation);
    }

    fn schedule_retry(self: &Arc<Self>, generation: u64) {
        let mut state = self.state();
        // A listener may have reconnected or disconnected us meanwhile.
        if state.generation != generation || state.session.is_some() || state.endpoint.is_none() {
            return;
        }
        if self.listeners().is_empty() {
            tracing::debug!("No listeners left, not reconnecting");
            return;
        }

        let policy = &self.config.retry;
        if !policy.allows(state.attempts) {
            tracing::warn!(
                attempts = state.attempts,
                "Reconnect attempts exhausted, channel is dormant until the next connect",
            );
            return;
        }

        state.attempts += 1;
        let attempt = state.attempts;
        let delay = policy.delay_for(attempt);
        let cancel = CancellationToken::new();
        state.pending_retry = Some(cancel.clone());

        tracing::info!(
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Scheduling channel reconnect",
        );

        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            inner.retry(generation, &cancel);
        });
    }

    fn retry(self: &Arc<Self>, generation: u64, cancel: &CancellationToken) {
        let mut state = self.state();
        if state.generation != generation || cancel.is_cancelled() {
            return;
        }
        state.pending_retry = None;
        tracing::info!(attempt = state.attempts, "Reconnecting channel");
        self.dial(&mut state);
    }
}

/// Listener registration that deregisters itself on drop.
///
/// Dropping the last subscription of a channel disconnects it, exactly as
/// [`SocketChannel::remove_listener`] does.
pub struct Subscription<C: Connector = WsConnector> {
    channel: SocketChannel<C>,
    id: ListenerId,
}

impl<C: Connector> Subscription<C> {
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl<C: Connector> Drop for Subscription<C> {
    fn drop(&mut self) {
        self.channel.remove_listener(self.id);
    }
}

/// Errors returned by channel operations.
///
/// Network and decode failures never surface here; they are logged and
/// handled by the reconnect path.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Invalid server address: {0}")]
    InvalidAddress(#[from] EndpointError),

    #[error("No Tokio runtime available to drive the channel")]
    NoRuntime,
}
