use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::{Notification, NotificationChannel, NotificationSink, NotifyError};

/// In-memory sink that records every notify call in order
#[derive(Default)]
pub struct RecordingSink {
    notifications: Mutex<Vec<Notification>>,
    channels: Mutex<Vec<NotificationChannel>>,
    deny_permission: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose `prepare` fails as if the user refused permission
    pub fn denying_permission() -> Self {
        Self {
            deny_permission: true,
            ..Self::default()
        }
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Latest notification per slot, as a user would see them
    pub fn visible(&self) -> HashMap<i32, Notification> {
        let mut visible = HashMap::new();
        for n in self.notifications() {
            visible.insert(n.slot_id, n);
        }
        visible
    }

    pub fn channels(&self) -> Vec<NotificationChannel> {
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl NotificationSink for RecordingSink {
    fn prepare(&self, channel: &NotificationChannel) -> Result<(), NotifyError> {
        if self.deny_permission {
            return Err(NotifyError::PermissionDenied);
        }
        self.channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(channel.clone());
        Ok(())
    }

    fn notify(&self, notification: Notification) {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}
