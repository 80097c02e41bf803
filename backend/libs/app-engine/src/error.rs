//! Error types for the application engine

use opentelemetry_config::TelemetryError;
use std::time::Duration;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors raised while starting, running or stopping a service
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded or deserialized
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Bind address is neither a port nor a socket address
    #[error("invalid bind address {addr:?}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    /// gRPC server failed to bind or serve
    #[error("gRPC server failed: {0}")]
    Listen(#[from] tonic::transport::Error),

    /// Listen task panicked or was cancelled
    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Listen task returned without a shutdown request
    #[error("server stopped before shutdown was requested")]
    UnexpectedExit,

    #[error("server shutdown did not finish within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("tracing initialization failed: {0}")]
    Tracing(#[from] TelemetryError),
}

impl AppError {
    pub fn invalid_address(addr: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidAddress {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }
}
