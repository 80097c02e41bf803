//! gRPC Metrics Layer - Shared Tower Middleware for RED Metrics
//!
//! This library provides a reusable tower layer for collecting Prometheus metrics
//! on all gRPC services. It tracks:
//! - Requests by service/method/status
//! - Latency histograms
//! - In-flight request count
//!
//! Usage:
//! ```ignore
//! use grpc_metrics::GrpcMetricsLayer;
//!
//! grpc_metrics::register_metrics()?;
//! let server = Server::builder()
//!     .layer(GrpcMetricsLayer::new(true))
//!     .add_service(my_service)
//!     .serve(addr)
//!     .await?;
//!
//! // In the service's HTTP `/metrics` handler:
//! let body = grpc_metrics::gather_text()?;
//! ```

pub mod layer;
mod metrics;

pub use layer::{GrpcMetricsLayer, GrpcMetricsService, RequestGuard};
pub use metrics::{gather_text, GrpcMetrics, GRPC_METRICS};

/// Register metrics with the default Prometheus registry
///
/// Call this once during server initialization; repeated calls are harmless.
pub fn register_metrics() -> prometheus::Result<()> {
    GRPC_METRICS.register(prometheus::default_registry())
}
