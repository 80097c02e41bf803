//! Readiness state and health status conversions

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tonic_health::pb::health_check_response::ServingStatus as WireStatus;

/// Service health status
///
/// Readiness is strictly boolean, so only two states are reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Listen loop has started and the service can accept traffic
    Serving,
    /// Listen loop has not started yet
    NotServing,
}

impl From<bool> for HealthStatus {
    fn from(ready: bool) -> Self {
        if ready {
            HealthStatus::Serving
        } else {
            HealthStatus::NotServing
        }
    }
}

impl From<HealthStatus> for tonic_health::ServingStatus {
    fn from(status: HealthStatus) -> Self {
        match status {
            HealthStatus::Serving => tonic_health::ServingStatus::Serving,
            HealthStatus::NotServing => tonic_health::ServingStatus::NotServing,
        }
    }
}

impl From<HealthStatus> for WireStatus {
    fn from(status: HealthStatus) -> Self {
        match status {
            HealthStatus::Serving => WireStatus::Serving,
            HealthStatus::NotServing => WireStatus::NotServing,
        }
    }
}

/// Process readiness flag
///
/// Starts out not ready and flips to ready once, when the server's listen
/// task begins. Clones share the same flag, so the health service and the
/// lifecycle sequencer observe a single value without any global state.
#[derive(Debug, Clone, Default)]
pub struct Readiness {
    ready: Arc<AtomicBool>,
}

impl Readiness {
    /// Create a new, not-ready flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the process ready. There is no transition back.
    pub fn set_ready(&self) {
        if !self.ready.swap(true, Ordering::AcqRel) {
            tracing::debug!("Readiness set, health status is now SERVING");
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn status(&self) -> HealthStatus {
        HealthStatus::from(self.is_ready())
    }
}
