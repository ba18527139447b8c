use chrono::Utc;
use domain::OrderStatus;

use crate::slot::slot_id;
use crate::Notification;

/// What a notification about an order reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderNotice {
    Added,
    StatusChanged(String),
    Removed,
    /// Status computed locally by the advance command, before the store
    /// has confirmed it
    Advanced(OrderStatus),
}

impl OrderNotice {
    /// Label used for metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            OrderNotice::Added => "added",
            OrderNotice::StatusChanged(_) => "modified",
            OrderNotice::Removed => "removed",
            OrderNotice::Advanced(_) => "advanced",
        }
    }

    fn detail(&self) -> String {
        match self {
            OrderNotice::Added => "Nuevo pedido agregado".to_string(),
            OrderNotice::StatusChanged(status) => format!("Actualizado a: {}", status),
            OrderNotice::Removed => "Pedido eliminado".to_string(),
            OrderNotice::Advanced(status) => status.to_string(),
        }
    }

    pub fn to_notification(&self, order_id: &str) -> Notification {
        Notification {
            slot_id: slot_id(order_id),
            order_id: order_id.to_string(),
            title: format!("Pedido #{} actualizado", order_id),
            body: format!("Nuevo estado: {}", self.detail()),
            issued_at: Utc::now(),
        }
    }
}
