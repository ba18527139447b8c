use common::metrics;
use domain::{ChangeKind, ChangeRecord, SnapshotEvent};
use notifier::{NotificationSink, OrderNotice};
use order_store::{StoreError, SubscriptionEvent};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::view::MaterializedView;

/// Why a change record produced no notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MissingId,
    MissingStatus,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::MissingId => "missing_id",
            DropReason::MissingStatus => "missing_status",
        }
    }
}

/// Result of reconciling one subscription event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub notified: usize,
    pub dropped: usize,
    pub view_replaced: bool,
}

/// Map a change record to the order it concerns and what to tell the user
pub fn classify(change: &ChangeRecord) -> Result<(&str, OrderNotice), DropReason> {
    let order_id = change.order_id().ok_or(DropReason::MissingId)?;

    let notice = match change.kind {
        ChangeKind::Added => OrderNotice::Added,
        ChangeKind::Modified => {
            let status = change.status.clone().ok_or(DropReason::MissingStatus)?;
            OrderNotice::StatusChanged(status)
        }
        ChangeKind::Removed => OrderNotice::Removed,
    };

    Ok((order_id, notice))
}

/// Applies subscription events to the materialized view and dispatches one
/// notification per well-formed change record.
///
/// Events must be fed one at a time in arrival order.
pub struct OrderReconciler {
    collection: String,
    view: MaterializedView,
    sink: Arc<dyn NotificationSink>,
}

impl OrderReconciler {
    pub fn new(
        collection: impl Into<String>,
        view: MaterializedView,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            collection: collection.into(),
            view,
            sink,
        }
    }

    pub fn handle(&self, event: SubscriptionEvent) -> ReconcileOutcome {
        match event {
            Ok(snapshot) => self.apply_snapshot(snapshot),
            Err(error) => {
                self.apply_error(&error);
                ReconcileOutcome::default()
            }
        }
    }

    pub fn apply_snapshot(&self, event: SnapshotEvent) -> ReconcileOutcome {
        let started = Instant::now();
        let SnapshotEvent { records, changes } = event;
        let view_size = records.len();

        self.view.replace(records);

        let mut outcome = ReconcileOutcome {
            view_replaced: true,
            ..ReconcileOutcome::default()
        };

        for change in &changes {
            match classify(change) {
                Ok((order_id, notice)) => {
                    debug!(
                        order_id = %order_id,
                        kind = %change.kind,
                        "Dispatching order notification"
                    );
                    metrics::record_notification(notice.label());
                    self.sink.notify(notice.to_notification(order_id));
                    outcome.notified += 1;
                }
                Err(reason) => {
                    debug!(
                        kind = %change.kind,
                        reason = reason.as_str(),
                        "Dropping malformed change record"
                    );
                    metrics::record_dropped_change(reason.as_str());
                    outcome.dropped += 1;
                }
            }
        }

        metrics::record_snapshot(&self.collection, view_size, started.elapsed().as_secs_f64());
        info!(
            collection = %self.collection,
            orders = view_size,
            changes = changes.len(),
            notified = outcome.notified,
            dropped = outcome.dropped,
            "Snapshot reconciled"
        );

        outcome
    }

    /// A store-reported failure leaves the view untouched
    pub fn apply_error(&self, error: &StoreError) {
        metrics::record_subscription_error();
        warn!(
            collection = %self.collection,
            error = %error,
            "Subscription error, keeping last known orders"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Order, OrderStatus};
    use notifier::{slot_id, RecordingSink};

    fn reconciler() -> (OrderReconciler, MaterializedView, Arc<RecordingSink>) {
        let view = MaterializedView::new();
        let sink = Arc::new(RecordingSink::new());
        let reconciler = OrderReconciler::new("pedidos", view.clone(), sink.clone());
        (reconciler, view, sink)
    }

    fn change(kind: ChangeKind, id: Option<&str>, status: Option<&str>) -> ChangeRecord {
        ChangeRecord::new(kind, id.map(str::to_string), status.map(str::to_string))
    }

    #[test]
    fn test_classify() {
        let added = change(ChangeKind::Added, Some("001"), None);
        let (id, notice) = classify(&added).unwrap();
        assert_eq!(id, "001");
        assert_eq!(notice, OrderNotice::Added);

        let (_, notice) =
            classify(&change(ChangeKind::Modified, Some("001"), Some("Entregado"))).unwrap();
        assert_eq!(notice, OrderNotice::StatusChanged("Entregado".to_string()));

        let (_, notice) = classify(&change(ChangeKind::Removed, Some("001"), None)).unwrap();
        assert_eq!(notice, OrderNotice::Removed);
    }

    #[test]
    fn test_classify_rejects_malformed_records() {
        assert_eq!(
            classify(&change(ChangeKind::Added, None, None)).unwrap_err(),
            DropReason::MissingId
        );
        assert_eq!(
            classify(&change(ChangeKind::Removed, Some(""), None)).unwrap_err(),
            DropReason::MissingId
        );
        assert_eq!(
            classify(&change(ChangeKind::Modified, Some("001"), None)).unwrap_err(),
            DropReason::MissingStatus
        );
    }

    #[test]
    fn test_snapshot_replaces_view_and_notifies_per_change() {
        let (reconciler, view, sink) = reconciler();
        let records = vec![
            Order::new("001", "20/10/2025", OrderStatus::Shipping, "$12.000"),
            Order::new("003", "22/10/2025", OrderStatus::Preparing, "$5.000"),
        ];

        let outcome = reconciler.apply_snapshot(SnapshotEvent::new(
            records.clone(),
            vec![
                change(ChangeKind::Modified, Some("001"), Some("En despacho")),
                change(ChangeKind::Added, Some("003"), Some("En preparación")),
                change(ChangeKind::Removed, Some("002"), Some("Entregado")),
            ],
        ));

        assert_eq!(outcome.notified, 3);
        assert_eq!(outcome.dropped, 0);
        assert_eq!(view.snapshot(), records);

        let bodies: Vec<String> = sink.notifications().into_iter().map(|n| n.body).collect();
        assert_eq!(
            bodies,
            vec![
                "Nuevo estado: Actualizado a: En despacho",
                "Nuevo estado: Nuevo pedido agregado",
                "Nuevo estado: Pedido eliminado",
            ]
        );
    }

    #[test]
    fn test_modified_uses_status_from_change_record() {
        let (reconciler, _view, sink) = reconciler();

        // The record in the snapshot already moved on; the change record wins.
        reconciler.apply_snapshot(SnapshotEvent::new(
            vec![Order::new("001", "20/10/2025", OrderStatus::Delivered, "$12.000")],
            vec![change(ChangeKind::Modified, Some("001"), Some("En despacho"))],
        ));

        assert_eq!(
            sink.notifications()[0].body,
            "Nuevo estado: Actualizado a: En despacho"
        );
    }

    #[test]
    fn test_malformed_changes_are_dropped_silently() {
        let (reconciler, view, sink) = reconciler();
        let records = vec![Order::new("001", "20/10/2025", OrderStatus::Preparing, "$1")];

        let outcome = reconciler.apply_snapshot(SnapshotEvent::new(
            records.clone(),
            vec![
                change(ChangeKind::Added, None, Some("En preparación")),
                change(ChangeKind::Modified, Some(""), Some("Entregado")),
                change(ChangeKind::Modified, Some("001"), None),
            ],
        ));

        assert_eq!(outcome.notified, 0);
        assert_eq!(outcome.dropped, 3);
        assert_eq!(sink.count(), 0);
        assert_eq!(view.snapshot(), records);
    }

    #[test]
    fn test_error_leaves_view_untouched() {
        let (reconciler, view, sink) = reconciler();
        let records = vec![Order::new("001", "20/10/2025", OrderStatus::Preparing, "$1")];
        reconciler.apply_snapshot(SnapshotEvent::new(records.clone(), vec![]));

        let outcome = reconciler.handle(Err(StoreError::PermissionDenied(
            "rules rejected read".to_string(),
        )));

        assert_eq!(outcome, ReconcileOutcome::default());
        assert_eq!(view.snapshot(), records);
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn test_notifications_for_same_order_share_slot() {
        let (reconciler, _view, sink) = reconciler();
        reconciler.apply_snapshot(SnapshotEvent::new(
            vec![],
            vec![
                change(ChangeKind::Added, Some("004"), Some("En preparación")),
                change(ChangeKind::Removed, Some("004"), Some("En preparación")),
            ],
        ));

        let notifications = sink.notifications();
        assert_eq!(notifications[0].slot_id, slot_id("004"));
        assert_eq!(notifications[1].slot_id, slot_id("004"));
        assert_eq!(sink.visible().len(), 1);
    }
}
