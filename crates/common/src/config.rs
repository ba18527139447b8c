use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::telemetry::TelemetryConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub orders_collection: String,
    pub log_level: String,
    pub log_json: bool,
    pub enable_jaeger: bool,
    pub jaeger_endpoint: Option<String>,
    pub notification_channel_id: String,
    pub update_timeout_secs: u64,
    pub seed_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            orders_collection: "pedidos".to_string(),
            log_level: "info".to_string(),
            log_json: true,
            enable_jaeger: false,
            jaeger_endpoint: None,
            notification_channel_id: "pedidos_channel".to_string(),
            update_timeout_secs: 10,
            seed_file: None,
        }
    }
}

impl Config {
    /// Build configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup, falling back to
    /// defaults for absent keys
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let orders_collection = lookup("ORDERS_COLLECTION").unwrap_or(defaults.orders_collection);
        if orders_collection.trim().is_empty() {
            return Err(ConfigError::Empty("ORDERS_COLLECTION"));
        }

        let notification_channel_id =
            lookup("NOTIFICATION_CHANNEL_ID").unwrap_or(defaults.notification_channel_id);
        if notification_channel_id.trim().is_empty() {
            return Err(ConfigError::Empty("NOTIFICATION_CHANNEL_ID"));
        }

        let enable_jaeger = parse_bool(&lookup, "ENABLE_JAEGER", defaults.enable_jaeger)?;
        let log_json = parse_bool(&lookup, "LOG_JSON", defaults.log_json)?;

        let update_timeout_secs = match lookup("UPDATE_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(0) => {
                    return Err(ConfigError::InvalidValue {
                        key: "UPDATE_TIMEOUT_SECS",
                        value: raw,
                        reason: "must be greater than zero".to_string(),
                    })
                }
                Ok(secs) => secs,
                Err(e) => {
                    return Err(ConfigError::InvalidValue {
                        key: "UPDATE_TIMEOUT_SECS",
                        value: raw.clone(),
                        reason: e.to_string(),
                    })
                }
            },
            None => defaults.update_timeout_secs,
        };

        Ok(Self {
            orders_collection,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_json,
            enable_jaeger,
            jaeger_endpoint: lookup("JAEGER_ENDPOINT"),
            notification_channel_id,
            update_timeout_secs,
            seed_file: lookup("SEED_FILE").map(PathBuf::from),
        })
    }

    pub fn update_timeout(&self) -> Duration {
        Duration::from_secs(self.update_timeout_secs)
    }

    pub fn telemetry(&self, service_name: &str) -> TelemetryConfig {
        TelemetryConfig {
            service_name: service_name.to_string(),
            log_level: self.log_level.clone(),
            jaeger_endpoint: self.jaeger_endpoint.clone(),
            enable_jaeger: self.enable_jaeger,
            json_logs: self.log_json,
        }
    }
}

fn parse_bool<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.parse::<bool>().map_err(|e| ConfigError::InvalidValue {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
