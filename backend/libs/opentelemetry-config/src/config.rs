//! Tracing settings, read from a configuration section or the environment

use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub(crate) const DEFAULT_OTLP_ENDPOINT: &str = "http://jaeger:4317";
const DEFAULT_SAMPLE_RATE: f64 = 0.1;

/// Settings for the OTLP span exporter
///
/// Missing fields take their default when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub enabled: bool,
    /// gRPC endpoint of the OTLP collector
    pub otlp_endpoint: String,
    /// Fraction of root traces to keep, see [`TracingConfig::sample_ratio`]
    pub sample_rate: f64,
    /// Reported as `service.version`
    pub service_version: String,
    /// Reported as `deployment.environment`
    pub environment: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            service_version: "dev".to_string(),
            environment: "development".to_string(),
        }
    }
}

impl TracingConfig {
    /// Build from `TRACING_ENABLED`, `OTLP_ENDPOINT`, `TRACING_SAMPLE_RATE`,
    /// `SERVICE_VERSION` and `APP_ENV`
    ///
    /// Unset or unparseable variables keep the default value.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: parsed_env("TRACING_ENABLED").unwrap_or(defaults.enabled),
            otlp_endpoint: std::env::var("OTLP_ENDPOINT").unwrap_or(defaults.otlp_endpoint),
            sample_rate: parsed_env::<f64>("TRACING_SAMPLE_RATE")
                .map(|rate| rate.clamp(0.0, 1.0))
                .unwrap_or(defaults.sample_rate),
            service_version: std::env::var("SERVICE_VERSION").unwrap_or(defaults.service_version),
            environment: std::env::var("APP_ENV").unwrap_or(defaults.environment),
        }
    }

    /// `sample_rate` limited to `0.0..=1.0`; NaN samples nothing
    pub fn sample_ratio(&self) -> f64 {
        if self.sample_rate.is_nan() {
            0.0
        } else {
            self.sample_rate.clamp(0.0, 1.0)
        }
    }
}

fn parsed_env<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}
