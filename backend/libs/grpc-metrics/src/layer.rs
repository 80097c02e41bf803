//! Tower layer recording RED metrics for every gRPC request

use crate::metrics::GRPC_METRICS;
use pin_project::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};

/// gRPC status code reported when the inner service fails outright (UNKNOWN)
const TRANSPORT_FAILURE_CODE: &str = "2";

/// Split a `/package.Service/Method` path into its service and method parts
pub fn split_path(path: &str) -> (&str, &str) {
    match path.trim_start_matches('/').split_once('/') {
        Some((service, method)) if !service.is_empty() && !method.is_empty() => (service, method),
        _ => ("unknown", "unknown"),
    }
}

/// RAII guard for tracking in-flight requests
///
/// Increments the in-flight gauge when created and decrements it when
/// dropped. `complete()` records the status code and latency.
pub struct RequestGuard {
    service: String,
    method: String,
    start: Instant,
}

impl RequestGuard {
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        let service = service.into();
        let method = method.into();
        GRPC_METRICS.request_started(&service, &method);
        Self {
            service,
            method,
            start: Instant::now(),
        }
    }

    /// Record the request as completed with the given gRPC status code
    pub fn complete(self, code: &str) {
        GRPC_METRICS.record_request(&self.service, &self.method, code, self.start.elapsed());
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        GRPC_METRICS.request_finished(&self.service, &self.method);
    }
}

/// Layer that wraps a gRPC router with metrics collection
///
/// A disabled layer passes requests through without touching any metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrpcMetricsLayer {
    enabled: bool,
}

impl GrpcMetricsLayer {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl<S> Layer<S> for GrpcMetricsLayer {
    type Service = GrpcMetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GrpcMetricsService {
            inner,
            enabled: self.enabled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GrpcMetricsService<S> {
    inner: S,
    enabled: bool,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for GrpcMetricsService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let guard = self.enabled.then(|| {
            let (service, method) = split_path(req.uri().path());
            RequestGuard::new(service, method)
        });

        ResponseFuture {
            inner: self.inner.call(req),
            guard,
        }
    }
}

#[pin_project]
pub struct ResponseFuture<F> {
    #[pin]
    inner: F,
    guard: Option<RequestGuard>,
}

impl<F, ResBody, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<http::Response<ResBody>, E>>,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let result = ready!(this.inner.poll(cx));

        if let Some(guard) = this.guard.take() {
            let code = match &result {
                // Trailers-only responses carry the status in the headers
                Ok(response) => response
                    .headers()
                    .get("grpc-status")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("0"),
                Err(_) => TRANSPORT_FAILURE_CODE,
            };
            guard.complete(code);
        }

        Poll::Ready(result)
    }
}
