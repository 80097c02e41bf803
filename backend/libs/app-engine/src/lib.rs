//! # App Engine
//!
//! Bootstrap layer for gRPC services. It wires configuration, the tonic
//! server, tag-triggered OpenTelemetry tracing, the grpc.health.v1 endpoint and
//! signal-driven graceful shutdown into a single lifecycle.
//!
//! ## Example
//!
//! ```no_run
//! use app_engine::{app, Configuration};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let conf = Configuration::load("svc1")?;
//!
//!     app(
//!         |server| {
//!             // server.routes().add_service(GreeterServer::new(greeter));
//!             let _ = server;
//!         },
//!         "svc1",
//!         &conf,
//!     )
//!     .await;
//!
//!     Ok(())
//! }
//! ```
//!
//! Services that are not gRPC servers can use [`daemon`] to run until
//! interrupted.

mod daemon;
mod error;
mod lifecycle;
mod server;
mod settings;
mod signal;
mod telemetry;

pub use daemon::{daemon, daemon_until};
pub use error::{AppError, Result};
pub use lifecycle::{app, opt_app, supervise, try_app, AppHandle, Engine, SHUTDOWN_TIMEOUT};
pub use server::{
    app_port_override, resolve_bind_addr, GrpcServer, ServerControl, ServerHandle, APP_PORT_ENV,
};
pub use settings::{Configuration, ServerConfig, CONFIG_FILE_ENV};
pub use signal::shutdown_signal;
pub use telemetry::{OtlpTracing, TracingInit};

// Re-export readiness so callers can share the flag with other probes
pub use grpc_health::{HealthStatus, Readiness};
