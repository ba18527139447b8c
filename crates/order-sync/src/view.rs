use domain::Order;
use std::sync::Arc;
use tokio::sync::watch;

/// Immutable point-in-time copy of the materialized view
#[derive(Debug, Clone, Default)]
pub struct OrderSnapshot {
    orders: Arc<Vec<Order>>,
}

impl OrderSnapshot {
    pub fn new(orders: Vec<Order>) -> Self {
        Self {
            orders: Arc::new(orders),
        }
    }

    /// Orders in store result order
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// First order with the given id
    pub fn find(&self, order_id: &str) -> Option<&Order> {
        self.orders.iter().find(|order| order.id == order_id)
    }

    /// Orders still in progress
    pub fn active(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|order| !order.status.is_terminal())
    }

    /// Delivered orders
    pub fn history(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|order| order.status.is_terminal())
    }
}

impl PartialEq for OrderSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.orders() == other.orders()
    }
}

impl PartialEq<[Order]> for OrderSnapshot {
    fn eq(&self, other: &[Order]) -> bool {
        self.orders() == other
    }
}

impl PartialEq<Vec<Order>> for OrderSnapshot {
    fn eq(&self, other: &Vec<Order>) -> bool {
        self.orders() == other.as_slice()
    }
}

/// Local mirror of the remote order collection.
///
/// Only ever replaced wholesale. Readers get an [`OrderSnapshot`] either by
/// pulling [`MaterializedView::snapshot`] or by watching for replacements.
#[derive(Debug, Clone)]
pub struct MaterializedView {
    current: Arc<watch::Sender<OrderSnapshot>>,
}

impl MaterializedView {
    pub fn new() -> Self {
        let (current, _) = watch::channel(OrderSnapshot::default());
        Self {
            current: Arc::new(current),
        }
    }

    pub fn replace(&self, records: Vec<Order>) {
        self.current.send_replace(OrderSnapshot::new(records));
    }

    pub fn snapshot(&self) -> OrderSnapshot {
        self.current.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<OrderSnapshot> {
        self.current.subscribe()
    }
}

impl Default for MaterializedView {
    fn default() -> Self {
        Self::new()
    }
}
