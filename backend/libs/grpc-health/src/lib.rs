//! # gRPC Health Check Library
//!
//! Readiness-driven implementation of the standard grpc.health.v1 protocol
//! for Kubernetes liveness and readiness probes.
//!
//! - `Check` answers `SERVING` once the server's listen loop has started and
//!   `NOT_SERVING` before that.
//! - `Watch` is not supported and always answers `UNIMPLEMENTED`.
//!
//! ## Example
//!
//! ```ignore
//! use grpc_health::{health_server, Readiness};
//!
//! let readiness = Readiness::new();
//! let health_service = health_server(readiness.clone());
//!
//! // Add health_service to your gRPC server, then once listening:
//! readiness.set_ready();
//! ```

mod health;
mod service;

pub use health::{HealthStatus, Readiness};
pub use service::{health_server, ReadinessHealthService};

// Re-export tonic-health types for convenience
pub use tonic_health::pb::health_server::HealthServer;
