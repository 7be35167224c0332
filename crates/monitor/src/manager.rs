//! Recording-status monitor for one ping-viewer server.
//!
//! [`RecordingMonitor`] owns a [`SocketChannel`] to the server's recording
//! WebSocket, folds every status frame into a [`SessionTable`], and turns
//! channel and table changes into [`MonitorEvent`]s. When a
//! [`RecordingsApi`] is configured the table is refreshed over REST each
//! time the channel (re)connects, so updates missed while disconnected
//! are recovered.
//!
//! Events are broadcast via a [`tokio::sync::broadcast`] channel. Call
//! [`RecordingMonitor::subscribe`] to receive them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use pingview_channel::{
    ChannelError, ChannelEvent, Connector, SocketChannel, Subscription, WsConnector,
};
use pingview_core::recording::RecordingSession;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::api::{RecordingsApi, RecordingsApiError};
use crate::events::MonitorEvent;
use crate::sessions::{SessionTable, SyncMark};

/// Broadcast channel capacity for monitor events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Tracks recording sessions reported by one server.
pub struct RecordingMonitor<C: Connector = WsConnector> {
    channel: SocketChannel<C>,
    shared: Arc<Shared>,
    runtime: Handle,
    /// The monitor's channel listener while started.
    subscription: Mutex<Option<Subscription<C>>>,
}

/// State reachable from the channel listener.
struct Shared {
    sessions: RwLock<SessionTable>,
    api: Option<RecordingsApi>,
    event_tx: broadcast::Sender<MonitorEvent>,
}

impl<C: Connector> RecordingMonitor<C> {
    /// Wrap `channel`. Must be called from within a Tokio runtime; REST
    /// refreshes are spawned there.
    pub fn new(channel: SocketChannel<C>, api: Option<RecordingsApi>) -> Result<Self, MonitorError> {
        let runtime = Handle::try_current().map_err(|_| MonitorError::NoRuntime)?;
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            channel,
            shared: Arc::new(Shared {
                sessions: RwLock::new(SessionTable::new()),
                api,
                event_tx,
            }),
            runtime,
            subscription: Mutex::new(None),
        })
    }

    /// Subscribe to monitor events.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Start monitoring the server at `address`.
    ///
    /// Registers the monitor's listener (once) and connects the channel.
    /// Calling it again while started switches servers only if the
    /// channel is not currently connected.
    pub fn start(&self, address: &str) -> Result<(), MonitorError> {
        let mut subscription = self.subscription();
        let newly_subscribed = subscription.is_none();

        if newly_subscribed {
            let shared = Arc::clone(&self.shared);
            let channel = self.channel.clone();
            let runtime = self.runtime.clone();
            *subscription = Some(self.channel.subscribe(move |event: &ChannelEvent| {
                shared.on_channel_event(event, &channel, &runtime);
            }));
        }

        if let Err(e) = self.channel.connect(address) {
            if newly_subscribed {
                subscription.take();
            }
            return Err(e.into());
        }

        tracing::info!(address, "Recording monitor started");
        Ok(())
    }

    /// Stop monitoring. Removes the monitor's listener, which disconnects
    /// the channel when no other listener remains. The session table is
    /// kept.
    pub fn stop(&self) {
        if self.subscription().take().is_some() {
            tracing::info!("Recording monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.subscription().is_some()
    }

    /// Merge the server's REST view into the session table.
    ///
    /// Devices the channel reports on while the request is in flight keep
    /// the channel's status. Returns the number of sessions now known.
    pub async fn refresh(&self) -> Result<usize, MonitorError> {
        let mark = self.shared.sessions().mark();
        self.shared.refresh(mark).await
    }

    /// Start recording `device` through the REST API and record the
    /// resulting session.
    pub async fn start_recording(&self, device: Uuid) -> Result<RecordingSession, MonitorError> {
        let session = self.shared.api()?.start_recording(device).await?;
        self.shared.record(session.clone());
        Ok(session)
    }

    /// Stop recording `device` through the REST API and record the
    /// resulting session.
    pub async fn stop_recording(&self, device: Uuid) -> Result<RecordingSession, MonitorError> {
        let session = self.shared.api()?.stop_recording(device).await?;
        self.shared.record(session.clone());
        Ok(session)
    }

    /// Every known session, ordered by device id.
    pub fn sessions(&self) -> Vec<RecordingSession> {
        self.shared.sessions().sessions()
    }

    pub fn session(&self, device_id: &str) -> Option<RecordingSession> {
        self.shared.sessions().get(device_id).cloned()
    }

    /// Sessions currently recording, ordered by device id.
    pub fn active_sessions(&self) -> Vec<RecordingSession> {
        self.shared.sessions().active()
    }

    pub fn channel(&self) -> &SocketChannel<C> {
        &self.channel
    }

    pub fn api(&self) -> Option<&RecordingsApi> {
        self.shared.api.as_ref()
    }

    fn subscription(&self) -> MutexGuard<'_, Option<Subscription<C>>> {
        self.subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Shared {
    fn sessions(&self) -> RwLockReadGuard<'_, SessionTable> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn sessions_mut(&self) -> RwLockWriteGuard<'_, SessionTable> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn api(&self) -> Result<&RecordingsApi, MonitorError> {
        self.api.as_ref().ok_or(MonitorError::ApiUnavailable)
    }

    fn emit(&self, event: MonitorEvent) {
        // No receivers is fine.
        let _ = self.event_tx.send(event);
    }

    fn record(&self, session: RecordingSession) {
        let event = self.sessions_mut().upsert(session);
        self.emit(event);
    }

    fn on_channel_event<C: Connector>(
        self: &Arc<Self>,
        event: &ChannelEvent,
        channel: &SocketChannel<C>,
        runtime: &Handle,
    ) {
        match event {
            ChannelEvent::Connected => {
                self.emit(MonitorEvent::ChannelConnected);
                if self.api.is_some() {
                    // Marked here so frames that arrive before the task runs
                    // still win over the snapshot.
                    let mark = self.sessions().mark();
                    let shared = Arc::clone(self);
                    runtime.spawn(async move {
                        if let Err(e) = shared.refresh(mark).await {
                            tracing::warn!(error = %e, "Failed to refresh recording sessions");
                        }
                    });
                }
            }
            ChannelEvent::Disconnected => {
                let retries_exhausted = channel.retries_exhausted();
                if retries_exhausted {
                    tracing::error!(
                        attempts = channel.attempts(),
                        "Recording channel gave up reconnecting",
                    );
                } else {
                    tracing::warn!("Recording channel disconnected");
                }
                self.emit(MonitorEvent::ChannelDisconnected { retries_exhausted });
            }
            ChannelEvent::Message(inbound) => {
                let events = self.sessions_mut().apply(&inbound.message);
                if events.is_empty() {
                    tracing::debug!(payload = %inbound.payload, "Ignoring unrecognized frame");
                }
                for event in events {
                    tracing::debug!(?event, "Recording status changed");
                    self.emit(event);
                }
            }
        }
    }

    async fn refresh(&self, mark: SyncMark) -> Result<usize, MonitorError> {
        let sessions = self.api()?.list_sessions().await?;
        let (event, total) = {
            let mut table = self.sessions_mut();
            let event = table.merge_snapshot(sessions, mark);
            (event, table.len())
        };

        tracing::info!(total, "Recording sessions refreshed");
        self.emit(event);
        Ok(total)
    }
}

/// Errors from the recording monitor.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Api(#[from] RecordingsApiError),

    #[error("No recordings API configured")]
    ApiUnavailable,

    #[error("No Tokio runtime available to drive the monitor")]
    NoRuntime,
}
