//! Inbound frame decoding and listener fan-out.
//!
//! Each text frame normally holds one JSON document. Frames that fail to
//! parse as a whole but span several lines are treated as
//! newline-delimited JSON and parsed line by line. Anything that still
//! fails to parse is logged and dropped.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;

use crate::events::{ChannelEvent, InboundMessage};

/// A registered listener callback.
pub type Listener = Arc<dyn Fn(&ChannelEvent) + Send + Sync>;

/// Decode one text frame into zero or more inbound messages.
pub fn decode_frame(text: &str) -> Vec<InboundMessage> {
    match serde_json::from_str::<Value>(text) {
        Ok(payload) => vec![InboundMessage::new(payload)],
        Err(e) if text.contains('\n') => {
            tracing::trace!(error = %e, "Frame is not a single document, splitting lines");
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .filter_map(|line| match serde_json::from_str::<Value>(line) {
                    Ok(payload) => Some(InboundMessage::new(payload)),
                    Err(e) => {
                        tracing::warn!(error = %e, raw_message = %line, "Dropping malformed line");
                        None
                    }
                })
                .collect()
        }
        Err(e) => {
            tracing::warn!(error = %e, raw_message = %text, "Dropping malformed frame");
            Vec::new()
        }
    }
}

/// Deliver `event` to every listener in order.
///
/// A panicking listener is logged and skipped; the remaining listeners
/// still receive the event. Returns the number of listeners that
/// completed normally.
pub fn dispatch(listeners: &[Listener], event: &ChannelEvent) -> usize {
    let mut delivered = 0;
    for (index, listener) in listeners.iter().enumerate() {
        match catch_unwind(AssertUnwindSafe(|| listener(event))) {
            Ok(()) => delivered += 1,
            Err(panic) => {
                tracing::error!(
                    listener = index,
                    panic = %panic_message(panic.as_ref()),
                    "Channel listener panicked",
                );
            }
        }
    }
    delivered
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
