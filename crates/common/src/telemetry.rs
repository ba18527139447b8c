use opentelemetry::global;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tracing_subscriber::{
    layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_level: String,
    pub jaeger_endpoint: Option<String>,
    pub enable_jaeger: bool,
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "companion-service".to_string(),
            log_level: "info".to_string(),
            jaeger_endpoint: None,
            enable_jaeger: false,
            json_logs: true,
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

// Logs go to stderr; stdout belongs to the operator console.
fn fmt_layer(json: bool) -> BoxedLayer {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true);

    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

/// Initialize tracing/logging for the application with optional Jaeger support
pub fn init_telemetry(config: TelemetryConfig) -> Result<(), Box<dyn std::error::Error>> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry()
        .with(fmt_layer(config.json_logs))
        .with(env_filter);

    if config.enable_jaeger {
        let tracer = opentelemetry_jaeger::new_agent_pipeline()
            .with_service_name(&config.service_name)
            .with_endpoint(config.jaeger_endpoint.unwrap_or_else(|| "localhost:6831".to_string()))
            .install_batch(opentelemetry_sdk::runtime::Tokio)?;

        subscriber
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .try_init()?;

        tracing::info!(
            service = %config.service_name,
            "Telemetry initialized with Jaeger tracing"
        );
    } else {
        subscriber.try_init()?;

        tracing::info!(
            service = %config.service_name,
            "Telemetry initialized without Jaeger"
        );
    }

    Ok(())
}

/// Shutdown telemetry gracefully
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}
