//! Event model and wire codec for the ssevents engine.
//!
//! This crate is shared by the server (`sse`, `web`) and the client
//! (`sse-client`) so that both ends agree on a single representation of a
//! Server-Sent Event and on how it is framed on the wire.
//!
//! # Architecture
//!
//! - **Event**: one SSE record (`id`, `event`, `data`, `retry`)
//! - **codec**: `Event::encode` for the write side, `Decoder` / `decode` for the read side
//!
//! This crate has no dependencies on internal crates, avoiding circular
//! dependencies between the server and client halves.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod codec;

pub use codec::{decode, DecodeError, Decoder};

/// Name carried by every internally generated keep-alive event.
pub const HEARTBEAT_EVENT: &str = "heartbeat";

/// A single Server-Sent Event.
///
/// The JSON shape matches what the emit endpoint accepts:
/// `{"id": "...", "event": "...", "data": "...", "retry": 1000}` where only
/// `data` is required to be non-empty before an event may be broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Sets the EventSource object's last event ID value in a browser.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Event type. Absent (or empty) dispatches to the browser's `onmessage`.
    #[serde(rename = "event", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Payload, sent on one `data:` line. Must not contain newlines.
    #[serde(default)]
    pub data: String,
    /// Reconnection delay hint in milliseconds for browser clients.
    #[serde(rename = "retry", default, skip_serializing_if = "Option::is_none")]
    pub retry_ms: Option<u64>,
}

impl Event {
    /// Unnamed event, delivered to `onmessage` listeners.
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn named(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            data: data.into(),
            ..Self::default()
        }
    }

    /// Keep-alive event; `timestamp` becomes the data payload.
    pub fn heartbeat(timestamp: impl Into<String>) -> Self {
        Self::named(HEARTBEAT_EVENT, timestamp)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_retry(mut self, retry_ms: u64) -> Self {
        self.retry_ms = Some(retry_ms);
        self
    }

    /// The event type, treating an empty name the same as no name.
    pub fn event_type(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }

    pub fn is_heartbeat(&self) -> bool {
        self.event_type() == Some(HEARTBEAT_EVENT)
    }

    /// Events without data are never broadcast.
    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(id) = &self.id {
            write!(f, "id: {id} ")?;
        }
        if let Some(name) = self.event_type() {
            write!(f, "event: {name} ")?;
        }
        if let Some(retry) = self.retry_ms {
            write!(f, "retry: {retry} ")?;
        }
        write!(f, "data: {}", self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_is_named_heartbeat() {
        let event = Event::heartbeat("2024-01-01T00:00:00Z");
        assert!(event.is_heartbeat());
        assert_eq!(event.data, "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_empty_name_is_unnamed() {
        let event = Event {
            name: Some(String::new()),
            data: "x".to_string(),
            ..Event::default()
        };
        assert_eq!(event.event_type(), None);
        assert!(!event.is_heartbeat());
    }

    #[test]
    fn test_deserialize_emit_payload() {
        let event: Event =
            serde_json::from_str(r#"{"id":"7","event":"Custom","data":"hello","retry":1500}"#)
                .unwrap();
        assert_eq!(
            event,
            Event::named("Custom", "hello").with_id("7").with_retry(1500)
        );
    }

    #[test]
    fn test_deserialize_missing_data_defaults_to_empty() {
        let event: Event = serde_json::from_str(r#"{"event":"Custom"}"#).unwrap();
        assert!(!event.has_data());
    }

    #[test]
    fn test_serialize_skips_unset_fields() {
        let json = serde_json::to_value(Event::new("hello")).unwrap();
        assert_eq!(json, serde_json::json!({"data": "hello"}));
    }

    #[test]
    fn test_display_lists_set_fields() {
        let event = Event::named("update", "payload").with_id("1");
        assert_eq!(event.to_string(), "id: 1 event: update data: payload");
    }
}
