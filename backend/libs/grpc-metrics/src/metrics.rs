//! Prometheus collectors for gRPC server traffic

use lazy_static::lazy_static;
use prometheus::core::Collector;
use prometheus::{
    histogram_opts, opts, CounterVec, Encoder, HistogramVec, IntGaugeVec, Registry, Result,
    TextEncoder,
};
use std::time::Duration;

lazy_static! {
    /// Process-wide collectors shared by every metrics layer
    pub static ref GRPC_METRICS: GrpcMetrics = GrpcMetrics::new();
}

/// Request count, latency and concurrency per gRPC method
#[derive(Clone)]
pub struct GrpcMetrics {
    /// `grpc_server_requests_total{service, method, code}`
    pub requests_total: CounterVec,
    /// `grpc_server_request_duration_seconds{service, method}`
    pub request_duration_seconds: HistogramVec,
    /// `grpc_server_in_flight_requests{service, method}`
    pub in_flight_requests: IntGaugeVec,
}

impl GrpcMetrics {
    pub fn new() -> Self {
        Self::try_new().expect("gRPC metric definitions are valid")
    }

    fn try_new() -> Result<Self> {
        let method_labels = &["service", "method"];

        Ok(Self {
            requests_total: CounterVec::new(
                opts!("grpc_server_requests_total", "gRPC requests handled, by status code"),
                &["service", "method", "code"],
            )?,
            request_duration_seconds: HistogramVec::new(
                histogram_opts!(
                    "grpc_server_request_duration_seconds",
                    "Time to produce a gRPC response"
                ),
                method_labels,
            )?,
            in_flight_requests: IntGaugeVec::new(
                opts!(
                    "grpc_server_in_flight_requests",
                    "gRPC requests currently being handled"
                ),
                method_labels,
            )?,
        })
    }

    /// Add the collectors to `registry`; already registered ones are skipped
    pub fn register(&self, registry: &Registry) -> Result<()> {
        let collectors: [Box<dyn Collector>; 3] = [
            Box::new(self.requests_total.clone()),
            Box::new(self.request_duration_seconds.clone()),
            Box::new(self.in_flight_requests.clone()),
        ];

        for collector in collectors {
            match registry.register(collector) {
                Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn record_request(&self, service: &str, method: &str, code: &str, elapsed: Duration) {
        self.requests_total
            .with_label_values(&[service, method, code])
            .inc();
        self.request_duration_seconds
            .with_label_values(&[service, method])
            .observe(elapsed.as_secs_f64());
    }

    pub fn request_started(&self, service: &str, method: &str) {
        self.in_flight_requests
            .with_label_values(&[service, method])
            .inc();
    }

    pub fn request_finished(&self, service: &str, method: &str) {
        self.in_flight_requests
            .with_label_values(&[service, method])
            .dec();
    }
}

impl Default for GrpcMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode everything in the default registry in the text exposition format
///
/// This is the body a service's `/metrics` handler returns to Prometheus.
pub fn gather_text() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
