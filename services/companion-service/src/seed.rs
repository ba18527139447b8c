use anyhow::{Context, Result};
use domain::{Order, OrderStatus};
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// Orders loaded when no seed file is configured
pub fn sample_orders() -> Vec<Order> {
    vec![
        Order::new("001", "20/10/2025", OrderStatus::Preparing, "$12.000"),
        Order::new("002", "21/10/2025", OrderStatus::Shipping, "$8.990"),
        Order::new("003", "22/10/2025", OrderStatus::Preparing, "$41.200"),
        Order::new("004", "15/10/2025", OrderStatus::Delivered, "$25.000"),
        Order::new("005", "10/10/2025", OrderStatus::Delivered, "$32.000"),
        Order::new("006", "05/10/2025", OrderStatus::Delivered, "$18.500"),
    ]
}

/// Decode a JSON array of order records
pub fn parse_orders(raw: &str) -> Result<Vec<Order>> {
    let records: Vec<Value> = serde_json::from_str(raw).context("seed must be a JSON array")?;

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            Order::from_record(record).with_context(|| format!("invalid order at index {}", index))
        })
        .collect()
}

/// Orders from `path`, or the built-in samples when no path is given
pub fn load_orders(path: Option<&Path>) -> Result<Vec<Order>> {
    let Some(path) = path else {
        info!("No seed file configured, using sample orders");
        return Ok(sample_orders());
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    let orders = parse_orders(&raw)?;

    info!(path = %path.display(), orders = orders.len(), "Seed file loaded");
    Ok(orders)
}
