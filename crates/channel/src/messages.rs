//! Typed classification of recording-status frames.
//!
//! The recording WebSocket carries plain JSON objects with no type tag.
//! Three shapes are recognised:
//!
//! * `{"AllRecordingStatus": [session, ...]}` -- bulk sync of every session;
//! * `{"device_id": ..., "RecordingStatus": {...}}` -- one session, nested;
//! * `{"device_id": ..., "is_active": ..., ...}` -- one session, flat.
//!
//! Anything else is [`RecordingMessage::Unrecognized`]; the raw payload is
//! still handed to listeners so they can shape-check it themselves.

use pingview_core::recording::RecordingSession;
use serde_json::{Map, Value};

const ALL_RECORDING_STATUS: &str = "AllRecordingStatus";
const RECORDING_STATUS: &str = "RecordingStatus";
const DEVICE_ID: &str = "device_id";
const IS_ACTIVE: &str = "is_active";

/// A decoded recording-status frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingMessage {
    /// Snapshot of every session known to the server.
    AllRecordingStatus(Vec<RecordingSession>),
    /// Status of a single device's recording.
    RecordingStatus(RecordingSession),
    /// A payload of any other shape.
    Unrecognized,
}

impl RecordingMessage {
    /// Classify an already-parsed JSON payload.
    pub fn classify(payload: &Value) -> Self {
        let Some(object) = payload.as_object() else {
            return Self::Unrecognized;
        };

        if let Some(all) = object.get(ALL_RECORDING_STATUS) {
            return match serde_json::from_value::<Vec<RecordingSession>>(all.clone()) {
                Ok(sessions) => Self::AllRecordingStatus(sessions),
                Err(e) => {
                    tracing::debug!(error = %e, "AllRecordingStatus payload has unexpected shape");
                    Self::Unrecognized
                }
            };
        }

        if let Some(nested) = object.get(RECORDING_STATUS).and_then(Value::as_object) {
            return decode_session(merge_nested(object, nested));
        }

        if object.contains_key(DEVICE_ID) && object.contains_key(IS_ACTIVE) {
            return decode_session(object.clone());
        }

        Self::Unrecognized
    }

    /// Device id this message is about, for single-session messages.
    pub fn device_id(&self) -> Option<&str> {
        match self {
            Self::RecordingStatus(session) => Some(&session.device_id),
            _ => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized)
    }
}

/// Nested status fields plus the top-level `device_id`, which wins over a
/// `device_id` inside the nested object.
fn merge_nested(outer: &Map<String, Value>, nested: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = nested.clone();
    if let Some(id) = outer.get(DEVICE_ID) {
        merged.insert(DEVICE_ID.to_string(), id.clone());
    }
    merged
}

fn decode_session(fields: Map<String, Value>) -> RecordingMessage {
    match serde_json::from_value::<RecordingSession>(Value::Object(fields)) {
        Ok(session) => RecordingMessage::RecordingStatus(session),
        Err(e) => {
            tracing::debug!(error = %e, "RecordingStatus payload has unexpected shape");
            RecordingMessage::Unrecognized
        }
    }
}
