use crate::store::Collection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sequence number for ordering events
pub type EventSequence = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// Non-blocking message for the operator (rendered as a toast)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelEvent {
    pub sequence: EventSequence,
    pub timestamp: DateTime<Utc>,
    pub payload: PanelEventPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PanelEventPayload {
    Notification(Notification),

    /// A collection was replaced with fresh data
    Refreshed { collection: Collection, count: usize },

    /// A refresh failed and the collection was cleared
    RefreshFailed { collection: Collection, reason: String },

    /// The watcher form was opened, closed, or edited
    FormChanged,

    /// Tab or visibility changed
    ViewChanged,
}

impl PanelEvent {
    pub fn notification(&self) -> Option<&Notification> {
        match &self.payload {
            PanelEventPayload::Notification(notification) => Some(notification),
            _ => None,
        }
    }

    pub fn payload_type(&self) -> &str {
        match &self.payload {
            PanelEventPayload::Notification(_) => "notification",
            PanelEventPayload::Refreshed { .. } => "refreshed",
            PanelEventPayload::RefreshFailed { .. } => "refresh_failed",
            PanelEventPayload::FormChanged => "form_changed",
            PanelEventPayload::ViewChanged => "view_changed",
        }
    }
}
