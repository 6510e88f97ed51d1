//! Realtime message types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An event delivered to connected sockets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    /// Event name
    pub event: String,
    /// Event payload
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RealtimeEvent {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Wire format on the pub/sub channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Node that published the event
    pub origin: Uuid,
    pub event: RealtimeEvent,
}
