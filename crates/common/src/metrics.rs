use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_gauge,
    CounterVec, Encoder, HistogramVec, IntCounter, IntGauge, TextEncoder,
};

lazy_static! {
    // Snapshot metrics
    pub static ref SNAPSHOT_COUNTER: IntCounter = register_int_counter!(
        "orders_snapshots_total",
        "Total number of snapshot events reconciled"
    )
    .expect("metric cannot be created");

    pub static ref SNAPSHOT_DURATION: HistogramVec = register_histogram_vec!(
        "orders_snapshot_duration_seconds",
        "Snapshot reconciliation duration in seconds",
        &["collection"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]
    )
    .expect("metric cannot be created");

    pub static ref MATERIALIZED_VIEW_SIZE: IntGauge = register_int_gauge!(
        "orders_materialized_view_size",
        "Number of orders in the local materialized view"
    )
    .expect("metric cannot be created");

    // Notification metrics
    pub static ref NOTIFICATION_COUNTER: CounterVec = register_counter_vec!(
        "orders_notifications_total",
        "Total number of notifications dispatched",
        &["kind"]
    )
    .expect("metric cannot be created");

    pub static ref DROPPED_CHANGE_COUNTER: CounterVec = register_counter_vec!(
        "orders_change_records_dropped_total",
        "Total number of change records dropped without notification",
        &["reason"]
    )
    .expect("metric cannot be created");

    // Store metrics
    pub static ref SUBSCRIPTION_ERROR_COUNTER: IntCounter = register_int_counter!(
        "orders_subscription_errors_total",
        "Total number of errors delivered on the order subscription"
    )
    .expect("metric cannot be created");

    pub static ref STATUS_UPDATE_COUNTER: CounterVec = register_counter_vec!(
        "orders_status_updates_total",
        "Total number of background status updates by outcome",
        &["status"]
    )
    .expect("metric cannot be created");
}

/// Get all metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Helper function to record a reconciled snapshot
pub fn record_snapshot(collection: &str, view_size: usize, duration_secs: f64) {
    SNAPSHOT_COUNTER.inc();
    SNAPSHOT_DURATION
        .with_label_values(&[collection])
        .observe(duration_secs);
    MATERIALIZED_VIEW_SIZE.set(view_size as i64);
}

/// Helper function to record a dispatched notification
pub fn record_notification(kind: &str) {
    NOTIFICATION_COUNTER.with_label_values(&[kind]).inc();
}

/// Helper function to record a change record dropped without notification
pub fn record_dropped_change(reason: &str) {
    DROPPED_CHANGE_COUNTER.with_label_values(&[reason]).inc();
}

pub fn record_subscription_error() {
    SUBSCRIPTION_ERROR_COUNTER.inc();
}

/// Helper function to record the outcome of a background status update
pub fn record_status_update(success: bool) {
    let status = if success { "success" } else { "error" };
    STATUS_UPDATE_COUNTER.with_label_values(&[status]).inc();
}
