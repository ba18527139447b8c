use domain::SnapshotEvent;
use tokio::sync::mpsc;
use tracing::debug;

use crate::StoreError;

/// One delivery on a subscription: a snapshot, or a store-reported failure
/// in its place.
pub type SubscriptionEvent = Result<SnapshotEvent, StoreError>;

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// A standing subscription on a collection.
///
/// The store registration is released when the subscription is dropped.
pub struct Subscription {
    collection: String,
    events: mpsc::UnboundedReceiver<SubscriptionEvent>,
    release: Option<ReleaseFn>,
}

impl Subscription {
    pub fn new<F>(
        collection: impl Into<String>,
        events: mpsc::UnboundedReceiver<SubscriptionEvent>,
        release: F,
    ) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            collection: collection.into(),
            events,
            release: Some(Box::new(release)),
        }
    }

    /// Subscription with nothing to release on drop
    pub fn detached(
        collection: impl Into<String>,
        events: mpsc::UnboundedReceiver<SubscriptionEvent>,
    ) -> Self {
        Self {
            collection: collection.into(),
            events,
            release: None,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Wait for the next event. Returns `None` once the store has closed
    /// the subscription.
    pub async fn next_event(&mut self) -> Option<SubscriptionEvent> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            debug!(collection = %self.collection, "Releasing subscription");
            self.events.close();
            release();
        }
    }
}
