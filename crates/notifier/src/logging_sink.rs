use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

use crate::{Notification, NotificationChannel, NotificationSink, NotifyError};

/// Sink that delivers notifications as structured log events.
///
/// Keeps the last notification shown per slot so that a repeat for the
/// same order is reported as a replacement.
#[derive(Default)]
pub struct LoggingNotificationSink {
    channel: Mutex<Option<NotificationChannel>>,
    shown: Mutex<HashMap<i32, Notification>>,
}

impl LoggingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notification currently occupying a slot
    pub fn shown(&self, slot_id: i32) -> Option<Notification> {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&slot_id)
            .cloned()
    }
}

impl NotificationSink for LoggingNotificationSink {
    fn prepare(&self, channel: &NotificationChannel) -> Result<(), NotifyError> {
        if channel.id.trim().is_empty() {
            return Err(NotifyError::ChannelRegistration {
                channel: channel.id.clone(),
                reason: "channel id is empty".to_string(),
            });
        }

        let mut registered = self.channel.lock().unwrap_or_else(PoisonError::into_inner);
        info!(
            channel_id = %channel.id,
            channel_name = %channel.name,
            importance = ?channel.importance,
            "Notification channel registered"
        );
        *registered = Some(channel.clone());
        Ok(())
    }

    fn notify(&self, notification: Notification) {
        let channel_id = match self
            .channel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(channel) => channel.id.clone(),
            None => {
                warn!(
                    order_id = %notification.order_id,
                    "Notification dropped: sink not prepared"
                );
                return;
            }
        };

        let mut shown = self.shown.lock().unwrap_or_else(PoisonError::into_inner);
        let replaced = shown.contains_key(&notification.slot_id);

        info!(
            channel_id = %channel_id,
            slot_id = notification.slot_id,
            order_id = %notification.order_id,
            title = %notification.title,
            body = %notification.body,
            replaced,
            "Notification shown"
        );

        shown.insert(notification.slot_id, notification);
    }
}
