//! grpc.health.v1 service backed by the readiness flag

use crate::health::{HealthStatus, Readiness};
use futures::stream::BoxStream;
use tonic::{Request, Response, Status};
use tonic_health::pb::health_check_response::ServingStatus as WireStatus;
use tonic_health::pb::health_server::{Health, HealthServer};
use tonic_health::pb::{HealthCheckRequest, HealthCheckResponse};

/// Health service that reports the process readiness for every service name
#[derive(Debug, Clone)]
pub struct ReadinessHealthService {
    readiness: Readiness,
}

impl ReadinessHealthService {
    pub fn new(readiness: Readiness) -> Self {
        Self { readiness }
    }

    pub fn status(&self) -> HealthStatus {
        self.readiness.status()
    }
}

#[tonic::async_trait]
impl Health for ReadinessHealthService {
    async fn check(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        let status = self.status();
        tracing::trace!(
            service = %request.get_ref().service,
            status = ?status,
            "Health check"
        );

        Ok(Response::new(HealthCheckResponse {
            status: WireStatus::from(status) as i32,
        }))
    }

    type WatchStream = BoxStream<'static, Result<HealthCheckResponse, Status>>;

    async fn watch(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> Result<Response<Self::WatchStream>, Status> {
        Err(Status::unimplemented("Watching is not supported"))
    }
}

/// Wrap the readiness flag in a server ready to be added to a router
pub fn health_server(readiness: Readiness) -> HealthServer<ReadinessHealthService> {
    HealthServer::new(ReadinessHealthService::new(readiness))
}
