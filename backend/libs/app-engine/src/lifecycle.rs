//! Service lifecycle sequencing
//!
//! Startup order: resolve the server section, initialize tracing when tagged,
//! register the health service, run the caller's registration callback, then
//! launch the listen loop. Shutdown runs the caller's cleanup first and then
//! stops the server within [`SHUTDOWN_TIMEOUT`].

use crate::error::{AppError, Result};
use crate::server::{GrpcServer, ServerControl, ServerHandle};
use crate::settings::Configuration;
use crate::signal::shutdown_signal;
use crate::telemetry::{OtlpTracing, TracingInit};
use grpc_health::{health_server, Readiness};
use opentelemetry_config::init_logging;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

/// Upper bound on waiting for the server to drain at shutdown
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder for starting a gRPC service
pub struct Engine<'a> {
    system_id: String,
    conf: &'a Configuration,
    monitor: bool,
    tracing: Box<dyn TracingInit>,
    readiness: Readiness,
}

impl<'a> Engine<'a> {
    pub fn new(system_id: impl Into<String>, conf: &'a Configuration) -> Self {
        Self {
            system_id: system_id.into(),
            conf,
            monitor: false,
            tracing: Box::new(OtlpTracing),
            readiness: Readiness::new(),
        }
    }

    /// Collect gRPC request metrics
    pub fn monitor(mut self, enabled: bool) -> Self {
        self.monitor = enabled;
        self
    }

    pub fn with_tracing(mut self, tracing: impl TracingInit + 'static) -> Self {
        self.tracing = Box::new(tracing);
        self
    }

    /// Report readiness through an externally owned flag
    pub fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }

    /// Start the service
    ///
    /// `register` runs exactly once, before the listen loop starts. Failures
    /// of the listen loop itself are reported through [`AppHandle::stopped`].
    pub fn start<F>(self, register: F) -> Result<AppHandle>
    where
        F: FnOnce(&mut GrpcServer),
    {
        let path = ["base", "app", self.system_id.as_str()];
        let (mut server, config) = GrpcServer::from_config(self.conf, self.monitor, &path)?;

        let tracing_enabled = self.init_telemetry(&config.tag);
        info!(
            system_id = %self.system_id,
            monitor = self.monitor,
            tracing = tracing_enabled,
            "Loading App Engine"
        );

        server
            .routes()
            .add_service(health_server(self.readiness.clone()));
        register(&mut server);

        let handle = server.launch(self.readiness.clone());
        info!(system_id = %self.system_id, "App Engine started");

        Ok(AppHandle {
            server: handle,
            readiness: self.readiness,
            tracing_enabled,
        })
    }

    fn init_telemetry(&self, tag: &str) -> bool {
        if tag.is_empty() {
            init_logging();
            return false;
        }

        match self.tracing.init(&self.system_id, self.conf, tag) {
            Ok(()) => true,
            Err(e) => {
                init_logging();
                warn!(error = %e, tag, "Tracing initialization failed, continuing without it");
                false
            }
        }
    }
}

/// A started service, used to stop it
pub struct AppHandle<S = ServerHandle> {
    server: S,
    readiness: Readiness,
    tracing_enabled: bool,
}

impl<S: ServerControl> AppHandle<S> {
    /// Wrap an already running server
    pub fn new(server: S, readiness: Readiness) -> Self {
        Self {
            server,
            readiness,
            tracing_enabled: false,
        }
    }

    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    pub fn tracing_enabled(&self) -> bool {
        self.tracing_enabled
    }

    /// Resolves if the listen loop exits before shutdown was requested
    pub async fn stopped(&mut self) -> Result<()> {
        self.server.stopped().await
    }

    /// Stop the server, waiting at most `limit` for it to drain
    ///
    /// On timeout the listen loop is aborted.
    pub async fn shutdown_within(&mut self, limit: Duration) -> Result<()> {
        match tokio::time::timeout(limit, self.server.shutdown()).await {
            Ok(result) => result,
            Err(_) => {
                self.server.abort();
                Err(AppError::ShutdownTimeout(limit))
            }
        }
    }

    /// Run `cleanup`, then stop the server within [`SHUTDOWN_TIMEOUT`]
    ///
    /// Shutdown failures are logged and never escalated.
    pub async fn close<F>(mut self, cleanup: F)
    where
        F: FnOnce() + Send,
    {
        cleanup();

        info!("App Engine shutting down server");
        if let Err(e) = self.shutdown_within(SHUTDOWN_TIMEOUT).await {
            error!(error = %e, "App Engine shutdown failed");
        }

        if self.tracing_enabled {
            if let Err(e) =
                tokio::task::spawn_blocking(opentelemetry_config::shutdown_tracing).await
            {
                warn!(error = %e, "Failed to flush traces");
            }
        }

        info!("App Engine exiting");
    }
}

/// Start a service and return its handle
pub fn opt_app<F>(
    register: F,
    monitor: bool,
    system_id: &str,
    conf: &Configuration,
) -> Result<AppHandle>
where
    F: FnOnce(&mut GrpcServer),
{
    Engine::new(system_id, conf).monitor(monitor).start(register)
}

/// Run a monitored service until Ctrl+C or SIGTERM
///
/// Startup and listen failures terminate the process with exit code 1.
pub async fn app<F>(register: F, system_id: &str, conf: &Configuration)
where
    F: FnOnce(&mut GrpcServer),
{
    if let Err(e) = try_app(register, system_id, conf, shutdown_signal()).await {
        error!(error = %e, system_id, "App Engine terminated");
        std::process::exit(1);
    }
}

/// Run a monitored service until `signal` resolves, reporting failures
pub async fn try_app<F, Sig>(
    register: F,
    system_id: &str,
    conf: &Configuration,
    signal: Sig,
) -> Result<()>
where
    F: FnOnce(&mut GrpcServer),
    Sig: Future<Output = ()>,
{
    let handle = opt_app(register, true, system_id, conf)?;
    supervise(handle, signal).await
}

/// Wait for `signal` and close the service, unless the listen loop dies first
pub async fn supervise<S, Sig>(mut handle: AppHandle<S>, signal: Sig) -> Result<()>
where
    S: ServerControl,
    Sig: Future<Output = ()>,
{
    tokio::select! {
        _ = signal => {}
        result = handle.stopped() => {
            let err = result.err().unwrap_or(AppError::UnexpectedExit);
            error!(error = %err, "App Engine listen loop exited");
            return Err(err);
        }
    }

    handle.close(|| {}).await;
    Ok(())
}
