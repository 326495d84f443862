//! Notification payload model
//!
//! The richer inbound payload carried by `notification` frames. The
//! authoritative read/dismissed state lives server-side; the client reflects
//! it optimistically after sending the corresponding acknowledgment frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a notification, ordered from least to most urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// Server-side delivery status of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Sent,
    Delivered,
    Failed,
}

/// Rendering hint for a notification action button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStyle {
    #[default]
    Default,
    Primary,
    Danger,
}

/// A user-actionable choice attached to a notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub id: String,
    pub label: String,
    pub action_type: String,
    /// Opaque payload forwarded when the action is taken
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub style: ActionStyle,
}

/// A notification delivered over the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    /// Target user
    pub user_id: String,
    pub title: String,
    pub message: String,
    /// Dashboard grouping, e.g. "applications" or "compliance"
    pub category: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: DeliveryStatus,
    /// Channels the notification was sent over (e.g. "websocket", "email")
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismissed_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Whether the notification has passed its expiry time
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }

    pub fn is_dismissed(&self) -> bool {
        self.dismissed_at.is_some()
    }
}
