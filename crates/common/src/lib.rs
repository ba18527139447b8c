pub mod config;
pub mod metrics;
pub mod telemetry;

pub use config::{Config, ConfigError};
pub use telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
