use async_trait::async_trait;
use domain::{ChangeKind, ChangeRecord, Order, SnapshotEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::subscription::{Subscription, SubscriptionEvent};
use crate::{DocumentHandle, OrderStore, StoreError};

struct Document {
    document_id: String,
    order: Order,
}

#[derive(Default)]
struct Collection {
    documents: Vec<Document>,
    listeners: HashMap<u64, mpsc::UnboundedSender<SubscriptionEvent>>,
}

impl Collection {
    fn records(&self) -> Vec<Order> {
        self.documents.iter().map(|d| d.order.clone()).collect()
    }

    /// Push an event to every live listener, pruning the closed ones
    fn broadcast(&mut self, event: SubscriptionEvent) {
        self.listeners
            .retain(|_, listener| listener.send(event.clone()).is_ok());
    }

    fn commit(&mut self, change: ChangeRecord) {
        let snapshot = SnapshotEvent::new(self.records(), vec![change]);
        self.broadcast(Ok(snapshot));
    }
}

#[derive(Default)]
struct StoreState {
    collections: HashMap<String, Collection>,
    next_listener_id: u64,
    update_failure: Option<StoreError>,
}

/// In-process document store.
///
/// Every mutation is committed and broadcast under one lock, so listeners
/// observe snapshots in commit order. Cloning shares the underlying state.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `orders` in `collection`
    pub fn with_orders(collection: &str, orders: impl IntoIterator<Item = Order>) -> Self {
        let store = Self::new();
        for order in orders {
            store.insert(collection, order);
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a document and notify listeners with an `added` change
    pub fn insert(&self, collection: &str, order: Order) -> DocumentHandle {
        let document_id = Uuid::new_v4().simple().to_string();
        let change = ChangeRecord::for_order(ChangeKind::Added, &order);

        let mut state = self.lock();
        let coll = state.collections.entry(collection.to_string()).or_default();
        coll.documents.push(Document {
            document_id: document_id.clone(),
            order,
        });
        coll.commit(change);

        debug!(collection = %collection, document_id = %document_id, "Document inserted");
        DocumentHandle::new(collection, document_id)
    }

    /// Delete a document and notify listeners with a `removed` change
    pub fn remove(&self, handle: &DocumentHandle) -> Result<Order, StoreError> {
        let mut state = self.lock();
        let coll = state
            .collections
            .get_mut(&handle.collection)
            .ok_or_else(|| StoreError::DocumentNotFound(handle.clone()))?;

        let position = coll
            .documents
            .iter()
            .position(|d| d.document_id == handle.document_id)
            .ok_or_else(|| StoreError::DocumentNotFound(handle.clone()))?;

        let removed = coll.documents.remove(position).order;
        coll.commit(ChangeRecord::for_order(ChangeKind::Removed, &removed));

        debug!(document = %handle, "Document removed");
        Ok(removed)
    }

    /// Current records of a collection, in insertion order
    pub fn documents(&self, collection: &str) -> Vec<Order> {
        self.lock()
            .collections
            .get(collection)
            .map(Collection::records)
            .unwrap_or_default()
    }

    /// Deliver `error` to every listener of `collection` in place of a snapshot
    pub fn broadcast_error(&self, collection: &str, error: StoreError) {
        let mut state = self.lock();
        if let Some(coll) = state.collections.get_mut(collection) {
            warn!(collection = %collection, error = %error, "Injecting subscription error");
            coll.broadcast(Err(error));
        }
    }

    /// Close every subscription on `collection` from the store side, as a
    /// dropped backend connection would
    pub fn disconnect(&self, collection: &str) {
        let mut state = self.lock();
        if let Some(coll) = state.collections.get_mut(collection) {
            let closed = coll.listeners.len();
            coll.listeners.clear();
            warn!(collection = %collection, closed, "Listeners disconnected");
        }
    }

    /// Make every subsequent `update_field` fail with `error`, or clear it
    pub fn set_update_failure(&self, error: Option<StoreError>) {
        self.lock().update_failure = error;
    }

    /// Number of live subscriptions on a collection
    pub fn listener_count(&self, collection: &str) -> usize {
        self.lock()
            .collections
            .get(collection)
            .map(|coll| {
                coll.listeners
                    .values()
                    .filter(|listener| !listener.is_closed())
                    .count()
            })
            .unwrap_or(0)
    }

    fn release_listener(state: &Weak<Mutex<StoreState>>, collection: &str, listener_id: u64) {
        let Some(state) = state.upgrade() else {
            return;
        };
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(coll) = state.collections.get_mut(collection) {
            coll.listeners.remove(&listener_id);
            info!(collection = %collection, listener_id, "Listener released");
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let listener_id = {
            let mut state = self.lock();
            let listener_id = state.next_listener_id;
            state.next_listener_id += 1;

            let coll = state.collections.entry(collection.to_string()).or_default();

            // A fresh listener sees every existing document as added
            let changes = coll
                .documents
                .iter()
                .map(|d| ChangeRecord::for_order(ChangeKind::Added, &d.order))
                .collect();
            let initial = SnapshotEvent::new(coll.records(), changes);

            tx.send(Ok(initial))
                .map_err(|_| StoreError::SubscriptionClosed)?;
            coll.listeners.insert(listener_id, tx);
            listener_id
        };

        info!(collection = %collection, listener_id, "Listener registered");

        let state = Arc::downgrade(&self.state);
        let name = collection.to_string();
        Ok(Subscription::new(collection, rx, move || {
            Self::release_listener(&state, &name, listener_id)
        }))
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<DocumentHandle>, StoreError> {
        let state = self.lock();
        let Some(coll) = state.collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut handles = Vec::new();
        for document in &coll.documents {
            if document.order.field(field)? == value {
                handles.push(DocumentHandle::new(collection, document.document_id.clone()));
            }
        }

        debug!(
            collection = %collection,
            field = %field,
            matches = handles.len(),
            "Query by field"
        );
        Ok(handles)
    }

    async fn update_field(
        &self,
        handle: &DocumentHandle,
        field: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        if let Some(error) = state.update_failure.clone() {
            return Err(error);
        }

        let coll = state
            .collections
            .get_mut(&handle.collection)
            .ok_or_else(|| StoreError::DocumentNotFound(handle.clone()))?;

        let document = coll
            .documents
            .iter_mut()
            .find(|d| d.document_id == handle.document_id)
            .ok_or_else(|| StoreError::DocumentNotFound(handle.clone()))?;

        if document.order.field(field)? == value {
            return Ok(());
        }
        document.order.set_field(field, value)?;

        let change = ChangeRecord::for_order(ChangeKind::Modified, &document.order);
        coll.commit(change);

        debug!(document = %handle, field = %field, value = %value, "Document updated");
        Ok(())
    }
}
