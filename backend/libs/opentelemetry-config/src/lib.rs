//! Tracing and log setup shared by the gRPC services
//!
//! [`init_tracing`] wires `tracing` spans into an OTLP exporter. Services
//! without a collector call [`init_logging`] for plain JSON logs instead.

use opentelemetry::{global, trace::TraceError, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    runtime,
    trace::{self as sdktrace, RandomIdGenerator, Sampler, Tracer},
    Resource,
};
use thiserror::Error;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter,
};

pub mod config;

pub use config::TracingConfig;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("tracing is disabled")]
    Disabled,

    #[error("failed to install OTLP tracer: {0}")]
    Exporter(#[from] TraceError),

    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

/// Export spans for `service_name` to the configured OTLP collector
///
/// Sets the W3C trace-context propagator and installs the global subscriber,
/// so it succeeds at most once per process. Needs a running Tokio runtime for
/// the batch exporter.
///
/// ```no_run
/// use opentelemetry_config::{init_tracing, TracingConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let config = TracingConfig {
///         enabled: true,
///         ..TracingConfig::default()
///     };
///
///     if let Err(e) = init_tracing("greeter", config) {
///         eprintln!("tracing unavailable: {e}");
///     }
/// }
/// ```
pub fn init_tracing(service_name: &str, config: TracingConfig) -> Result<Tracer, TelemetryError> {
    if !config.enabled {
        return Err(TelemetryError::Disabled);
    }

    global::set_text_map_propagator(TraceContextPropagator::new());
    let tracer = otlp_tracer(service_name, &config)?;

    tracing_subscriber::registry()
        .with(default_env_filter())
        .with(fmt::layer().with_target(true))
        .with(tracing_opentelemetry::layer().with_tracer(tracer.clone()))
        .try_init()?;

    tracing::info!(
        service = service_name,
        endpoint = %config.otlp_endpoint,
        sample_rate = config.sample_ratio(),
        "OTLP tracing enabled"
    );

    Ok(tracer)
}

fn otlp_tracer(service_name: &str, config: &TracingConfig) -> Result<Tracer, TraceError> {
    let resource = Resource::new([
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", config.service_version.clone()),
        KeyValue::new("deployment.environment", config.environment.clone()),
    ]);

    let trace_config = sdktrace::config()
        .with_sampler(Sampler::TraceIdRatioBased(config.sample_ratio()))
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(config.otlp_endpoint.clone()),
        )
        .with_trace_config(trace_config)
        .install_batch(runtime::Tokio)
}

/// Install a JSON log subscriber filtered by `RUST_LOG` (default `info`)
///
/// Returns `false` when another global subscriber is already in place; that
/// one is left untouched.
pub fn init_logging() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(default_env_filter())
        .with_target(false)
        .json()
        .try_init()
        .is_ok()
}

fn default_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Flush buffered spans and drop the global tracer provider
///
/// Blocks until the exporter drains.
pub fn shutdown_tracing() {
    global::shutdown_tracer_provider();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_config_is_rejected() {
        let result = init_tracing("greeter", TracingConfig::default());
        assert!(matches!(result, Err(TelemetryError::Disabled)));
    }

    #[test]
    fn test_init_logging_only_installs_once() {
        let _ = init_logging();
        assert!(!init_logging());
    }
}
