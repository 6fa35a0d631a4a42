//! Frames exchanged with the browser client.

use event_schema::NotificationEvent;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Outbound frame pushed to a session.
///
/// `event` is the name the client listens on, either `registered` or one of
/// the `<kind>_notification` names; `data` carries the kind-specific payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerFrame {
    pub event: String,
    pub data: serde_json::Value,
}

impl ServerFrame {
    /// Frame carrying one notification event's payload.
    pub fn notification(event: &NotificationEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event: event.event_name().to_string(),
            data: event.payload_json()?,
        })
    }

    /// Ack for a register handshake.
    pub fn registered(user_id: &str) -> Self {
        Self {
            event: "registered".to_string(),
            data: json!({ "userId": user_id }),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Inbound frames from the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Binds the session to a user. First frame a client sends.
    #[serde(rename_all = "camelCase")]
    Register { user_id: String },
}

impl ClientMessage {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
