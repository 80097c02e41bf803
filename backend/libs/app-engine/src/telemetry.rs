//! Tag-triggered tracing initialization

use crate::error::Result;
use crate::settings::Configuration;
use opentelemetry_config::{init_tracing, TracingConfig};

/// Initializes distributed tracing for a service
///
/// Called by the engine only when the server section carries a non-empty tag.
pub trait TracingInit: Send + Sync {
    fn init(&self, system_id: &str, conf: &Configuration, tag: &str) -> Result<()>;
}

/// OTLP tracing configured from `base/tracing/<tag>`
///
/// Falls back to `TracingConfig::from_env()` when that section is absent.
/// The tag is what turns tracing on, so `enabled` is always forced true.
#[derive(Debug, Clone, Copy, Default)]
pub struct OtlpTracing;

impl OtlpTracing {
    pub fn resolve_config(conf: &Configuration, tag: &str) -> Result<TracingConfig> {
        let mut config = conf
            .get_optional::<TracingConfig>(&["base", "tracing", tag])?
            .unwrap_or_else(TracingConfig::from_env);
        config.enabled = true;
        Ok(config)
    }
}

impl TracingInit for OtlpTracing {
    fn init(&self, system_id: &str, conf: &Configuration, tag: &str) -> Result<()> {
        let config = Self::resolve_config(conf, tag)?;
        init_tracing(system_id, config)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_config_from_section() {
        let conf = Configuration::from_config(
            config::Config::builder()
                .set_override("base.tracing.zipkin.otlp_endpoint", "http://collector:4317")
                .unwrap()
                .set_override("base.tracing.zipkin.sample_rate", 0.5)
                .unwrap()
                .build()
                .unwrap(),
        );

        let config = OtlpTracing::resolve_config(&conf, "zipkin").unwrap();
        assert!(config.enabled);
        assert_eq!(config.otlp_endpoint, "http://collector:4317");
        assert_eq!(config.sample_rate, 0.5);
        assert_eq!(config.service_version, "dev");
    }

    #[test]
    #[serial_test::serial]
    fn test_resolve_config_falls_back_to_env() {
        std::env::remove_var("TRACING_ENABLED");
        let conf = Configuration::from_config(config::Config::default());

        let config = OtlpTracing::resolve_config(&conf, "missing").unwrap();
        assert!(config.enabled);
    }
}
