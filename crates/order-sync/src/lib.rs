//! Order synchronization and notification dispatch.
//!
//! [`OrderSyncDispatcher`] keeps one standing subscription on the remote
//! order collection, mirrors each snapshot into a local
//! [`MaterializedView`] and turns every change record into a local
//! notification through a [`notifier::NotificationSink`].

pub mod dispatcher;
pub mod reconciler;
pub mod view;

pub use dispatcher::OrderSyncDispatcher;
pub use reconciler::{DropReason, OrderReconciler, ReconcileOutcome};
pub use view::{MaterializedView, OrderSnapshot};

use order_store::StoreError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to subscribe to order collection: {0}")]
    Subscribe(#[from] StoreError),

    #[error("Dispatcher already started")]
    AlreadyStarted,
}

/// Dispatcher settings
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub collection: String,
    /// Upper bound for one background status update, query included
    pub update_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            collection: "pedidos".to_string(),
            update_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&common::Config> for DispatcherConfig {
    fn from(config: &common::Config) -> Self {
        Self {
            collection: config.orders_collection.clone(),
            update_timeout: config.update_timeout(),
        }
    }
}
