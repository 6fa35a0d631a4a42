//! Notification event schema shared by producers and the delivery relay.
//!
//! Every notification travels the `notifications` Redis channel as one JSON
//! document. The `type` tag and camelCase field names are a wire contract
//! with the deployed JavaScript producers and the browser client, so they
//! must not drift:
//!
//! ```json
//! {
//!   "type": "like",
//!   "targetUserId": "66b0c1f2a9d3",
//!   "payload": { "tweetId": "...", "likerId": "...", "likerName": "...", "likerUsername": "..." },
//!   "producedAt": "2025-05-04T10:22:31.000Z"
//! }
//! ```
//!
//! `producedAt` is stamped by Rust producers but optional on decode; the
//! original producers never sent it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Schema violations caught before an event reaches the broker.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("targetUserId must not be empty")]
    EmptyTargetUser,

    #[error("unknown notification kind: {0}")]
    UnknownKind(String),
}

/// The three notification kinds the feed produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Follow,
    Like,
    Comment,
}

impl NotificationKind {
    /// Transport event name, `<kind>_notification`, as the browser client
    /// subscribes to it.
    pub fn event_name(&self) -> &'static str {
        match self {
            NotificationKind::Follow => "follow_notification",
            NotificationKind::Like => "like_notification",
            NotificationKind::Comment => "comment_notification",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Follow => write!(f, "follow"),
            NotificationKind::Like => write!(f, "like"),
            NotificationKind::Comment => write!(f, "comment"),
        }
    }
}

impl FromStr for NotificationKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "follow" => Ok(NotificationKind::Follow),
            "like" => Ok(NotificationKind::Like),
            "comment" => Ok(NotificationKind::Comment),
            other => Err(SchemaError::UnknownKind(other.to_string())),
        }
    }
}

/// Payload for `follow_notification`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FollowPayload {
    pub follower_id: String,
    pub follower_name: String,
    pub follower_username: String,
}

/// Payload for `like_notification`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LikePayload {
    pub tweet_id: String,
    pub liker_id: String,
    pub liker_name: String,
    pub liker_username: String,
}

/// Payload for `comment_notification`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommentPayload {
    pub tweet_id: String,
    pub comment_id: String,
    pub commenter_id: String,
    pub commenter_name: String,
    pub commenter_username: String,
    pub text: String,
}

/// One notification event as published on the broker channel.
///
/// Immutable value: created by business logic at publish time, consumed once
/// per relay instance, never persisted by this subsystem. User ids are the
/// opaque strings the rest of the system uses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NotificationEvent {
    #[serde(rename_all = "camelCase")]
    Follow {
        target_user_id: String,
        payload: FollowPayload,
        #[serde(default = "Utc::now")]
        produced_at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Like {
        target_user_id: String,
        payload: LikePayload,
        #[serde(default = "Utc::now")]
        produced_at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Comment {
        target_user_id: String,
        payload: CommentPayload,
        #[serde(default = "Utc::now")]
        produced_at: DateTime<Utc>,
    },
}

impl NotificationEvent {
    /// Create a follow event stamped with the current time.
    pub fn follow(target_user_id: impl Into<String>, payload: FollowPayload) -> Self {
        NotificationEvent::Follow {
            target_user_id: target_user_id.into(),
            payload,
            produced_at: Utc::now(),
        }
    }

    /// Create a like event stamped with the current time.
    pub fn like(target_user_id: impl Into<String>, payload: LikePayload) -> Self {
        NotificationEvent::Like {
            target_user_id: target_user_id.into(),
            payload,
            produced_at: Utc::now(),
        }
    }

    /// Create a comment event stamped with the current time.
    pub fn comment(target_user_id: impl Into<String>, payload: CommentPayload) -> Self {
        NotificationEvent::Comment {
            target_user_id: target_user_id.into(),
            payload,
            produced_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> NotificationKind {
        match self {
            NotificationEvent::Follow { .. } => NotificationKind::Follow,
            NotificationEvent::Like { .. } => NotificationKind::Like,
            NotificationEvent::Comment { .. } => NotificationKind::Comment,
        }
    }

    /// Transport event name for this event, `<kind>_notification`.
    pub fn event_name(&self) -> &'static str {
        self.kind().event_name()
    }

    pub fn target_user_id(&self) -> &str {
        match self {
            NotificationEvent::Follow { target_user_id, .. }
            | NotificationEvent::Like { target_user_id, .. }
            | NotificationEvent::Comment { target_user_id, .. } => target_user_id,
        }
    }

    pub fn produced_at(&self) -> DateTime<Utc> {
        match self {
            NotificationEvent::Follow { produced_at, .. }
            | NotificationEvent::Like { produced_at, .. }
            | NotificationEvent::Comment { produced_at, .. } => *produced_at,
        }
    }

    /// The kind-specific payload alone, as the transport frame carries it.
    pub fn payload_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            NotificationEvent::Follow { payload, .. } => serde_json::to_value(payload),
            NotificationEvent::Like { payload, .. } => serde_json::to_value(payload),
            NotificationEvent::Comment { payload, .. } => serde_json::to_value(payload),
        }
    }

    /// Publish-time check of the routing fields.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.target_user_id().trim().is_empty() {
            return Err(SchemaError::EmptyTargetUser);
        }
        Ok(())
    }

    /// Serialize to the wire JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from the wire JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
