//! Wire frame types for the notification protocol
//!
//! One JSON frame per WebSocket text message, mirroring the server-side
//! protocol definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved frame type strings consumed or produced internally.
pub mod types {
    /// Inbound: a notification payload (see [`crate::Notification`])
    pub const NOTIFICATION: &str = "notification";
    /// Inbound: sent by the server after it accepts the connection
    pub const CONNECTION_ESTABLISHED: &str = "connection_established";
    /// Inbound: sent by the server when it recognizes a returning client
    pub const RECONNECTION_SUCCESSFUL: &str = "reconnection_successful";
    /// Inbound: server-initiated liveness probe
    pub const PING: &str = "ping";
    /// Outbound: answer to a server `ping`
    pub const PONG: &str = "pong";
    /// Outbound: client-initiated liveness frame
    pub const HEARTBEAT: &str = "heartbeat";
    /// Outbound: optimistic read acknowledgment
    pub const MARK_NOTIFICATION_READ: &str = "mark_notification_read";
    /// Outbound: optimistic dismiss acknowledgment
    pub const DISMISS_NOTIFICATION: &str = "dismiss_notification";
    /// Outbound: request server-side room subscription
    pub const JOIN_ROOM: &str = "join_room";
    /// Outbound: drop a server-side room subscription
    pub const LEAVE_ROOM: &str = "leave_room";
    /// Subscription slot that receives every dispatched inbound frame
    pub const WILDCARD: &str = "*";
}

/// Delivery priority of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

/// One discrete JSON message exchanged over the connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Event type, routes the frame to its handlers
    #[serde(rename = "type")]
    pub kind: String,

    /// Arbitrary structured payload
    #[serde(default)]
    pub data: serde_json::Value,

    /// Creation time, ISO-8601
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl Frame {
    /// Create a frame of the given type, timestamped now
    pub fn new(kind: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            data,
            timestamp: Some(Utc::now()),
            priority: None,
        }
    }

    /// Set the frame priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Client-initiated liveness frame
    pub fn heartbeat() -> Self {
        Self::new(types::HEARTBEAT, serde_json::Value::Null)
    }

    /// Answer to a server `ping`
    pub fn pong() -> Self {
        Self::new(types::PONG, serde_json::Value::Null)
    }

    /// Ask the server to mark a notification as read
    pub fn mark_read(notification_id: &str) -> Self {
        Self::new(
            types::MARK_NOTIFICATION_READ,
            serde_json::json!({ "notification_id": notification_id }),
        )
    }

    /// Ask the server to dismiss a notification
    pub fn dismiss(notification_id: &str) -> Self {
        Self::new(
            types::DISMISS_NOTIFICATION,
            serde_json::json!({ "notification_id": notification_id }),
        )
    }

    /// Request a server-side room subscription
    pub fn join_room(room: &str) -> Self {
        Self::new(types::JOIN_ROOM, serde_json::json!({ "room": room }))
    }

    /// Drop a server-side room subscription
    pub fn leave_room(room: &str) -> Self {
        Self::new(types::LEAVE_ROOM, serde_json::json!({ "room": room }))
    }
}
