//! Per-device table of the latest recording status.

use std::collections::HashMap;

use pingview_channel::RecordingMessage;
use pingview_core::recording::RecordingSession;
use pingview_core::types::DeviceId;

use crate::events::MonitorEvent;

/// Latest known [`RecordingSession`] for every device seen so far.
///
/// Every change bumps a table revision. A REST snapshot requested at a
/// [`SyncMark`] is merged with [`SessionTable::merge_snapshot`], which keeps
/// whatever the channel reported after the mark.
#[derive(Debug, Clone, Default)]
pub struct SessionTable {
    sessions: HashMap<DeviceId, RecordingSession>,
    /// Revision of the last change to each device.
    revisions: HashMap<DeviceId, u64>,
    revision: u64,
    /// Revision of the last full snapshot.
    synced_at: u64,
}

/// Table revision at which a snapshot was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncMark(u64);

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one decoded frame into the table.
    ///
    /// Returns the events the change produced; unrecognized frames produce
    /// none.
    pub fn apply(&mut self, message: &RecordingMessage) -> Vec<MonitorEvent> {
        match message {
            RecordingMessage::AllRecordingStatus(sessions) => {
                vec![self.replace_all(sessions.iter().cloned())]
            }
            RecordingMessage::RecordingStatus(session) => vec![self.upsert(session.clone())],
            RecordingMessage::Unrecognized => Vec::new(),
        }
    }

    /// Replace the table with a full snapshot.
    pub fn replace_all<I>(&mut self, sessions: I) -> MonitorEvent
    where
        I: IntoIterator<Item = RecordingSession>,
    {
        let sessions = sessions
            .into_iter()
            .map(|session| (session.device_id.clone(), session))
            .collect();
        self.install(sessions)
    }

    /// Current revision, taken before requesting a snapshot that will be
    /// passed to [`merge_snapshot`](Self::merge_snapshot).
    pub fn mark(&self) -> SyncMark {
        SyncMark(self.revision)
    }

    /// Install a snapshot requested at `mark`.
    ///
    /// Devices changed after `mark` keep their current status. If a full
    /// snapshot was installed after `mark` the stale one is dropped and the
    /// table is left as is.
    pub fn merge_snapshot<I>(&mut self, sessions: I, mark: SyncMark) -> MonitorEvent
    where
        I: IntoIterator<Item = RecordingSession>,
    {
        if self.synced_at > mark.0 {
            return self.synced();
        }

        let mut merged: HashMap<_, _> = sessions
            .into_iter()
            .map(|session| (session.device_id.clone(), session))
            .collect();
        for (device_id, &revision) in &self.revisions {
            if revision > mark.0 {
                if let Some(session) = self.sessions.get(device_id) {
                    merged.insert(device_id.clone(), session.clone());
                }
            }
        }
        self.install(merged)
    }

    fn install(&mut self, sessions: HashMap<DeviceId, RecordingSession>) -> MonitorEvent {
        self.revision += 1;
        let revision = self.revision;
        self.synced_at = revision;
        self.revisions = sessions
            .keys()
            .map(|device_id| (device_id.clone(), revision))
            .collect();
        self.sessions = sessions;
        self.synced()
    }

    fn synced(&self) -> MonitorEvent {
        MonitorEvent::StatusSynced {
            active: self.active_count(),
            total: self.sessions.len(),
        }
    }

    /// Record the status of one device.
    ///
    /// Optional fields missing from `session` are kept from the previous
    /// entry, since status frames often carry only `is_active`.
    pub fn upsert(&mut self, mut session: RecordingSession) -> MonitorEvent {
        let was_active = match self.sessions.get(&session.device_id) {
            Some(previous) => {
                fill_missing(&mut session, previous);
                Some(previous.is_active)
            }
            None => None,
        };

        let event = match (was_active, session.is_active) {
            (Some(true), false) => MonitorEvent::RecordingStopped {
                session: session.clone(),
            },
            (None | Some(false), true) => MonitorEvent::RecordingStarted {
                session: session.clone(),
            },
            _ => MonitorEvent::RecordingUpdated {
                session: session.clone(),
            },
        };

        self.revision += 1;
        self.revisions.insert(session.device_id.clone(), self.revision);
        self.sessions.insert(session.device_id.clone(), session);
        event
    }

    pub fn get(&self, device_id: &str) -> Option<&RecordingSession> {
        self.sessions.get(device_id)
    }

    /// All sessions, ordered by device id.
    pub fn sessions(&self) -> Vec<RecordingSession> {
        let mut sessions: Vec<_> = self.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        sessions
    }

    /// Sessions currently recording, ordered by device id.
    pub fn active(&self) -> Vec<RecordingSession> {
        let mut sessions: Vec<_> = self
            .sessions
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        sessions
    }

    pub fn active_count(&self) -> usize {
        self.sessions.values().filter(|s| s.is_active).count()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn fill_missing(session: &mut RecordingSession, previous: &RecordingSession) {
    if session.file_path.is_none() {
        session.file_path.clone_from(&previous.file_path);
    }
    if session.start_time.is_none() {
        session.start_time = previous.start_time;
    }
    if session.device_type.is_none() {
        session.device_type.clone_from(&previous.device_type);
    }
}
