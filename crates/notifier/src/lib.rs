pub mod content;
pub mod logging_sink;
pub mod recording_sink;
pub mod slot;

pub use content::OrderNotice;
pub use logging_sink::LoggingNotificationSink;
pub use recording_sink::RecordingSink;
pub use slot::slot_id;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A local alert addressed to a notification slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub slot_id: i32,
    pub order_id: String,
    pub title: String,
    pub body: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Importance {
    Low,
    Default,
    High,
}

/// Channel under which order notifications are delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub id: String,
    pub name: String,
    pub description: String,
    pub importance: Importance,
}

impl NotificationChannel {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

impl Default for NotificationChannel {
    fn default() -> Self {
        Self {
            id: "pedidos_channel".to_string(),
            name: "Actualizaciones de pedidos".to_string(),
            description: "Notifica cuando el pedido cambia de estado".to_string(),
            importance: Importance::High,
        }
    }
}

/// Surface that shows local notifications to the user.
///
/// `notify` is fire-and-forget: a notification for a slot that is already
/// shown replaces it.
pub trait NotificationSink: Send + Sync {
    /// One-time permission check and channel registration. Must succeed
    /// before the first `notify`.
    fn prepare(&self, channel: &NotificationChannel) -> Result<(), NotifyError>;

    fn notify(&self, notification: Notification);
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Failed to register notification channel '{channel}': {reason}")]
    ChannelRegistration { channel: String, reason: String },
}
