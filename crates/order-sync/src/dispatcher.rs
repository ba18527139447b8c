use common::metrics;
use domain::order::fields;
use domain::OrderStatus;
use notifier::{NotificationSink, OrderNotice};
use order_store::{OrderStore, StoreError, Subscription};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

use crate::reconciler::OrderReconciler;
use crate::view::{MaterializedView, OrderSnapshot};
use crate::{DispatcherConfig, SyncError};

struct Listener {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Keeps a live local view of the order collection and notifies the user
/// about every change observed on it.
///
/// Holds exactly one store subscription between [`start`](Self::start) and
/// [`stop`](Self::stop). Dropping a running dispatcher aborts the listener,
/// which releases the subscription.
pub struct OrderSyncDispatcher {
    config: DispatcherConfig,
    store: Arc<dyn OrderStore>,
    sink: Arc<dyn NotificationSink>,
    view: MaterializedView,
    listener: Option<Listener>,
    updates: Mutex<JoinSet<()>>,
}

impl OrderSyncDispatcher {
    pub fn new(
        config: DispatcherConfig,
        store: Arc<dyn OrderStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            config,
            store,
            sink,
            view: MaterializedView::new(),
            listener: None,
            updates: Mutex::new(JoinSet::new()),
        }
    }

    pub fn collection(&self) -> &str {
        &self.config.collection
    }

    /// Subscribe to the order collection and start reconciling snapshots
    pub async fn start(&mut self) -> Result<(), SyncError> {
        if let Some(listener) = self.listener.take() {
            if !listener.task.is_finished() {
                self.listener = Some(listener);
                return Err(SyncError::AlreadyStarted);
            }
            // Stream was closed by the store; reap the dead listener and resubscribe
            if let Err(e) = listener.task.await {
                error!(error = %e, "Order listener task failed");
            }
            info!(collection = %self.config.collection, "Restarting after closed subscription");
        }

        info!(collection = %self.config.collection, "Starting order sync dispatcher");
        let subscription = self.store.subscribe(&self.config.collection).await?;

        let reconciler = OrderReconciler::new(
            self.config.collection.clone(),
            self.view.clone(),
            self.sink.clone(),
        );
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_listener(subscription, reconciler, shutdown_rx));

        self.listener = Some(Listener { shutdown, task });
        Ok(())
    }

    /// Release the subscription and wait for in-flight status updates.
    ///
    /// The view keeps its last contents. Calling `stop` on a dispatcher that
    /// is not running only drains pending updates.
    pub async fn stop(&mut self) {
        if let Some(listener) = self.listener.take() {
            // The listener may already have exited if the store closed the stream
            let _ = listener.shutdown.send(());
            if let Err(e) = listener.task.await {
                error!(error = %e, "Order listener task failed");
            }
            info!(collection = %self.config.collection, "Order sync dispatcher stopped");
        }

        let mut pending = std::mem::take(&mut *self.lock_updates());
        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Status update task failed");
            }
        }
    }

    /// Whether the listener is still consuming events
    pub fn is_running(&self) -> bool {
        self.listener
            .as_ref()
            .map(|listener| !listener.task.is_finished())
            .unwrap_or(false)
    }

    /// Point-in-time copy of the materialized view
    pub fn orders(&self) -> OrderSnapshot {
        self.view.snapshot()
    }

    /// Receiver notified every time the view is replaced
    pub fn watch_orders(&self) -> watch::Receiver<OrderSnapshot> {
        self.view.watch()
    }

    /// Move an order to the next status in the fulfilment cycle.
    ///
    /// The notification for the computed status is sent before the store is
    /// touched; the store update then runs in the background and its outcome
    /// is only logged. The confirming snapshot notifies again into the same
    /// slot. Returns `None` when the order is not in the current view.
    pub fn advance_status(&self, order_id: &str) -> Option<OrderStatus> {
        let snapshot = self.view.snapshot();
        let Some(order) = snapshot.find(order_id) else {
            warn!(order_id = %order_id, "Cannot advance status of unknown order");
            return None;
        };
        let next = order.status.next();

        info!(
            order_id = %order_id,
            from = %order.status,
            to = %next,
            "Advancing order status"
        );

        let notice = OrderNotice::Advanced(next.clone());
        metrics::record_notification(notice.label());
        self.sink.notify(notice.to_notification(order_id));

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!(order_id = %order_id, error = %e, "No runtime for status update");
                metrics::record_status_update(false);
                return Some(next);
            }
        };

        let update = push_status_update(
            self.store.clone(),
            self.config.collection.clone(),
            order_id.to_string(),
            next.clone(),
            self.config.update_timeout,
        );

        let mut updates = self.lock_updates();
        // Reap finished updates so the set does not grow unbounded
        while updates.try_join_next().is_some() {}
        updates.spawn_on(update, &runtime);

        Some(next)
    }

    fn lock_updates(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.updates.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for OrderSyncDispatcher {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            warn!(
                collection = %self.config.collection,
                "Dispatcher dropped while running, aborting listener"
            );
            listener.task.abort();
        }
        // Background updates already issued are left to finish on their own
        self.lock_updates().detach_all();
    }
}

async fn run_listener(
    mut subscription: Subscription,
    reconciler: OrderReconciler,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!(collection = %subscription.collection(), "Listener shutdown requested");
                break;
            }
            event = subscription.next_event() => match event {
                Some(event) => {
                    reconciler.handle(event);
                }
                None => {
                    warn!(collection = %subscription.collection(), "Subscription closed by store");
                    break;
                }
            },
        }
    }
}

async fn push_status_update(
    store: Arc<dyn OrderStore>,
    collection: String,
    order_id: String,
    status: OrderStatus,
    timeout: Duration,
) {
    let update = async {
        let handles = store
            .query_by_field(&collection, fields::ID, &order_id)
            .await?;

        if handles.is_empty() {
            warn!(order_id = %order_id, "No stored documents for order");
        }

        let mut failed = 0;
        for handle in &handles {
            if let Err(e) = store
                .update_field(handle, fields::STATUS, status.as_str())
                .await
            {
                error!(document = %handle, error = %e, "Status update rejected");
                failed += 1;
            }
        }
        Ok::<_, StoreError>((handles.len(), failed))
    };

    match tokio::time::timeout(timeout, update).await {
        Ok(Ok((documents, 0))) => {
            metrics::record_status_update(true);
            info!(order_id = %order_id, status = %status, documents, "Status update stored");
        }
        Ok(Ok((documents, failed))) => {
            metrics::record_status_update(false);
            error!(
                order_id = %order_id,
                status = %status,
                documents,
                failed,
                "Status update partially failed"
            );
        }
        Ok(Err(e)) => {
            metrics::record_status_update(false);
            error!(order_id = %order_id, error = %e, "Status update query failed");
        }
        Err(_) => {
            metrics::record_status_update(false);
            error!(
                order_id = %order_id,
                error = %StoreError::Timeout(timeout),
                "Status update timed out"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domain::{Order, SnapshotEvent};
    use mockall::mock;
    use notifier::RecordingSink;
    use order_store::{DocumentHandle, SubscriptionEvent};
    use tokio::sync::mpsc;

    mock! {
        pub Store {}

        #[async_trait]
        impl OrderStore for Store {
            async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError>;
            async fn query_by_field(
                &self,
                collection: &str,
                field: &str,
                value: &str,
            ) -> Result<Vec<DocumentHandle>, StoreError>;
            async fn update_field(
                &self,
                handle: &DocumentHandle,
                field: &str,
                value: &str,
            ) -> Result<(), StoreError>;
        }
    }

    fn order(id: &str, status: OrderStatus) -> Order {
        Order::new(id, "24/10/2025", status, "$48.500")
    }

    /// Mock store whose subscription is driven by the returned sender
    fn mock_with_feed() -> (MockStore, mpsc::UnboundedSender<SubscriptionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut store = MockStore::new();
        store
            .expect_subscribe()
            .times(1)
            .return_once(move |collection| Ok(Subscription::detached(collection, rx)));
        (store, tx)
    }

    async fn wait_for_len(rx: &mut watch::Receiver<OrderSnapshot>, len: usize) {
        while rx.borrow_and_update().len() != len {
            rx.changed().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let (store, _tx) = mock_with_feed();
        let mut dispatcher = OrderSyncDispatcher::new(
            DispatcherConfig::default(),
            Arc::new(store),
            Arc::new(RecordingSink::new()),
        );

        dispatcher.start().await.unwrap();
        assert!(matches!(dispatcher.start().await, Err(SyncError::AlreadyStarted)));
        dispatcher.stop().await;
    }

    #[tokio::test]
    async fn test_subscribe_failure_is_reported() {
        let mut store = MockStore::new();
        store
            .expect_subscribe()
            .returning(|_| Err(StoreError::PermissionDenied("no auth".to_string())));

        let mut dispatcher = OrderSyncDispatcher::new(
            DispatcherConfig::default(),
            Arc::new(store),
            Arc::new(RecordingSink::new()),
        );

        let result = dispatcher.start().await;
        assert!(matches!(
            result,
            Err(SyncError::Subscribe(StoreError::PermissionDenied(_)))
        ));
        assert!(!dispatcher.is_running());
    }

    #[tokio::test]
    async fn test_advance_unknown_order_does_nothing() {
        let store = MockStore::new();
        let sink = Arc::new(RecordingSink::new());
        let dispatcher =
            OrderSyncDispatcher::new(DispatcherConfig::default(), Arc::new(store), sink.clone());

        assert_eq!(dispatcher.advance_status("404"), None);
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn test_advance_updates_every_matching_document() {
        let (mut store, tx) = mock_with_feed();
        store
            .expect_query_by_field()
            .withf(|collection, field, value| {
                collection == "pedidos" && field == "id" && value == "004"
            })
            .times(1)
            .returning(|collection, _, _| {
                Ok(vec![
                    DocumentHandle::new(collection, "a"),
                    DocumentHandle::new(collection, "b"),
                ])
            });
        store
            .expect_update_field()
            .withf(|_, field, value| field == "status" && value == "En despacho")
            .times(2)
            .returning(|_, _, _| Ok(()));

        let sink = Arc::new(RecordingSink::new());
        let mut dispatcher =
            OrderSyncDispatcher::new(DispatcherConfig::default(), Arc::new(store), sink.clone());
        dispatcher.start().await.unwrap();

        let mut rx = dispatcher.watch_orders();
        tx.send(Ok(SnapshotEvent::new(
            vec![order("004", OrderStatus::Preparing)],
            vec![],
        )))
        .unwrap();
        wait_for_len(&mut rx, 1).await;

        assert_eq!(dispatcher.advance_status("004"), Some(OrderStatus::Shipping));
        dispatcher.stop().await;

        assert_eq!(sink.count(), 1);
    }

    #[tokio::test]
    async fn test_failed_update_keeps_optimistic_notification() {
        let (mut store, tx) = mock_with_feed();
        store
            .expect_query_by_field()
            .returning(|collection, _, _| Ok(vec![DocumentHandle::new(collection, "a")]));
        store
            .expect_update_field()
            .times(1)
            .returning(|_, _, _| Err(StoreError::PermissionDenied("read-only".to_string())));

        let sink = Arc::new(RecordingSink::new());
        let mut dispatcher =
            OrderSyncDispatcher::new(DispatcherConfig::default(), Arc::new(store), sink.clone());
        dispatcher.start().await.unwrap();

        let mut rx = dispatcher.watch_orders();
        tx.send(Ok(SnapshotEvent::new(
            vec![order("005", OrderStatus::Shipping)],
            vec![],
        )))
        .unwrap();
        wait_for_len(&mut rx, 1).await;

        assert_eq!(dispatcher.advance_status("005"), Some(OrderStatus::Delivered));
        dispatcher.stop().await;

        let notifications = sink.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].body, "Nuevo estado: Entregado");
        // Optimistic view is not applied locally; only the store can change it
        assert_eq!(dispatcher.orders().find("005").unwrap().status, OrderStatus::Shipping);
    }

    /// Store whose queries never resolve
    struct StalledStore {
        feed: Mutex<Option<mpsc::UnboundedReceiver<SubscriptionEvent>>>,
    }

    #[async_trait]
    impl OrderStore for StalledStore {
        async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError> {
            let rx = self
                .feed
                .lock()
                .unwrap()
                .take()
                .ok_or(StoreError::SubscriptionClosed)?;
            Ok(Subscription::detached(collection, rx))
        }

        async fn query_by_field(
            &self,
            _collection: &str,
            _field: &str,
            _value: &str,
        ) -> Result<Vec<DocumentHandle>, StoreError> {
            std::future::pending().await
        }

        async fn update_field(
            &self,
            _handle: &DocumentHandle,
            _field: &str,
            _value: &str,
        ) -> Result<(), StoreError> {
            unreachable!("query never resolves")
        }
    }

    #[tokio::test]
    async fn test_update_timeout_is_contained() {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = StalledStore {
            feed: Mutex::new(Some(rx)),
        };

        let config = DispatcherConfig {
            update_timeout: Duration::from_millis(20),
            ..DispatcherConfig::default()
        };
        let sink = Arc::new(RecordingSink::new());
        let mut dispatcher = OrderSyncDispatcher::new(config, Arc::new(store), sink.clone());
        dispatcher.start().await.unwrap();

        let mut rx = dispatcher.watch_orders();
        tx.send(Ok(SnapshotEvent::new(
            vec![order("006", OrderStatus::Delivered)],
            vec![],
        )))
        .unwrap();
        wait_for_len(&mut rx, 1).await;

        assert_eq!(dispatcher.advance_status("006"), Some(OrderStatus::Preparing));
        // Returns once the stalled update hits its deadline
        dispatcher.stop().await;
        assert_eq!(sink.count(), 1);
        assert_eq!(sink.notifications()[0].body, "Nuevo estado: En preparación");
    }

    #[tokio::test]
    async fn test_listener_exits_when_store_closes_stream() {
        let (store, tx) = mock_with_feed();
        let mut dispatcher = OrderSyncDispatcher::new(
            DispatcherConfig::default(),
            Arc::new(store),
            Arc::new(RecordingSink::new()),
        );
        dispatcher.start().await.unwrap();

        drop(tx);
        for _ in 0..100 {
            if !dispatcher.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!dispatcher.is_running());
        dispatcher.stop().await;
    }
}
