//! gRPC server engine: builds the tonic server from configuration, runs its
//! listen loop on a separate task and stops it on request.

use crate::error::{AppError, Result};
use crate::settings::{Configuration, ServerConfig};
use async_trait::async_trait;
use grpc_health::Readiness;
use grpc_metrics::GrpcMetricsLayer;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::lookup_host;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tonic::service::RoutesBuilder;
use tonic::transport::Server;
use tracing::{info, warn};

/// Environment variable overriding the configured bind address
pub const APP_PORT_ENV: &str = "AppPort";

/// Non-empty `AppPort` value, if any
pub fn app_port_override() -> Option<String> {
    std::env::var(APP_PORT_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Pick the bind address: a non-empty override wins over the configured one
///
/// Both follow the same convention: a bare port (`"9100"`) or `":9100"` binds
/// every interface, anything else is a `host:port` pair. Hostnames are
/// resolved and the first address returned is used.
pub async fn resolve_bind_addr(app_port: Option<&str>, configured: &str) -> Result<SocketAddr> {
    let chosen = app_port
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(configured);
    let target = bind_target(chosen);

    if let Ok(addr) = target.parse::<SocketAddr>() {
        return Ok(addr);
    }

    let mut resolved = lookup_host(target.as_str())
        .await
        .map_err(|e| AppError::invalid_address(&target, e))?;
    resolved
        .next()
        .ok_or_else(|| AppError::invalid_address(&target, "host resolved to no addresses"))
}

fn bind_target(raw: &str) -> String {
    let raw = raw.trim();
    if raw.parse::<u16>().is_ok() {
        format!("0.0.0.0:{raw}")
    } else if let Some(port) = raw.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        raw.to_string()
    }
}

/// A gRPC server that is still accepting service registrations
pub struct GrpcServer {
    config: ServerConfig,
    monitor: bool,
    routes: RoutesBuilder,
}

impl GrpcServer {
    pub fn new(config: ServerConfig, monitor: bool) -> Self {
        Self {
            config,
            monitor,
            routes: RoutesBuilder::default(),
        }
    }

    /// Build a server from the section stored at `path`
    ///
    /// A missing section falls back to `ServerConfig::default()`. Returns the
    /// resolved section alongside the server.
    pub fn from_config(
        conf: &Configuration,
        monitor: bool,
        path: &[&str],
    ) -> Result<(Self, ServerConfig)> {
        let config = match conf.get_optional::<ServerConfig>(path)? {
            Some(config) => config,
            None => {
                warn!(
                    path = %path.join("/"),
                    "Server configuration not found, using defaults"
                );
                ServerConfig::default()
            }
        };

        Ok((Self::new(config.clone(), monitor), config))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn monitor_enabled(&self) -> bool {
        self.monitor
    }

    /// Router that application services are added to
    ///
    /// ```ignore
    /// server.routes().add_service(GreeterServer::new(greeter));
    /// ```
    pub fn routes(&mut self) -> &mut RoutesBuilder {
        &mut self.routes
    }

    /// Serve on `addr` until `shutdown` resolves
    pub async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if self.monitor {
            if let Err(e) = grpc_metrics::register_metrics() {
                warn!(error = %e, "Failed to register gRPC metrics");
            }
        }

        let mut builder = Server::builder();
        if let Some(secs) = self.config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(limit) = self.config.concurrency_limit {
            builder = builder.concurrency_limit_per_connection(limit);
        }

        builder
            .layer(GrpcMetricsLayer::new(self.monitor))
            .add_routes(self.routes.routes())
            .serve_with_shutdown(addr, shutdown)
            .await?;

        Ok(())
    }

    /// Spawn the listen loop and hand back control of it
    ///
    /// The task marks `readiness` before resolving the bind address, so there
    /// is a short window where the process reports ready but is not bound yet.
    pub fn launch(self, readiness: Readiness) -> ServerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            readiness.set_ready();

            let app_port = app_port_override();
            let addr = resolve_bind_addr(app_port.as_deref(), &self.config.addr).await?;
            info!(%addr, monitor = self.monitor, "App Engine listening");

            self.serve(addr, async move {
                let _ = shutdown_rx.await;
            })
            .await
        });

        ServerHandle {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }
}

/// Control over a running listen loop
#[async_trait]
pub trait ServerControl: Send {
    /// Resolves when the listen loop exits without being asked to
    async fn stopped(&mut self) -> Result<()>;

    /// Ask the listen loop to stop and wait for it to drain
    async fn shutdown(&mut self) -> Result<()>;

    /// Force-close the listen loop after a shutdown wait expired
    fn abort(&mut self) {}
}

/// Handle to a launched `GrpcServer`
#[derive(Debug)]
pub struct ServerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<()>>>,
}

#[async_trait]
impl ServerControl for ServerHandle {
    async fn stopped(&mut self) -> Result<()> {
        let Some(task) = self.task.as_mut() else {
            return std::future::pending().await;
        };

        let outcome = task.await;
        self.task = None;
        outcome?
    }

    async fn shutdown(&mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        match self.task.as_mut() {
            Some(task) => {
                let outcome = task.await;
                self.task = None;
                outcome?
            }
            None => Ok(()),
        }
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
