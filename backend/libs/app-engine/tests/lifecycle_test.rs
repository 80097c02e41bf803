//! End-to-end lifecycle tests against a real tonic server on a local port

use app_engine::{
    try_app, AppError, Configuration, Engine, Readiness, TracingInit, APP_PORT_ENV,
};
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tonic::transport::Endpoint;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

#[derive(Clone, Default)]
struct RecordingTracing {
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingTracing {
    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl TracingInit for RecordingTracing {
    fn init(&self, system_id: &str, _conf: &Configuration, tag: &str) -> app_engine::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((system_id.to_string(), tag.to_string()));
        Ok(())
    }
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn configuration(system_id: &str, addr: &str, tag: &str) -> Configuration {
    let config = config::Config::builder()
        .set_override(format!("base.app.{system_id}.addr"), addr)
        .unwrap()
        .set_override(format!("base.app.{system_id}.tag"), tag)
        .unwrap()
        .build()
        .unwrap();
    Configuration::from_config(config)
}

async fn health_status(port: u16) -> anyhow::Result<i32> {
    health_status_at(&format!("http://127.0.0.1:{port}")).await
}

async fn health_status_at(uri: &str) -> anyhow::Result<i32> {
    let channel = Endpoint::from_shared(uri.to_string())?.connect().await?;
    let mut client = HealthClient::new(channel);
    let response = client
        .check(HealthCheckRequest {
            service: String::new(),
        })
        .await?;
    Ok(response.into_inner().status)
}

async fn wait_for_status(port: u16) -> i32 {
    wait_for_status_at(&format!("http://127.0.0.1:{port}")).await
}

async fn wait_for_status_at(uri: &str) -> i32 {
    for _ in 0..100 {
        if let Ok(status) = health_status_at(uri).await {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("health endpoint never came up at {uri}");
}

#[tokio::test]
#[serial]
async fn test_serves_health_on_configured_address() {
    std::env::remove_var(APP_PORT_ENV);
    let port = free_port();
    let conf = configuration("svc1", &format!("127.0.0.1:{port}"), "");
    let tracing = RecordingTracing::default();
    let readiness = Readiness::new();
    let registrations = AtomicUsize::new(0);

    assert!(!readiness.is_ready());

    let handle = Engine::new("svc1", &conf)
        .with_tracing(tracing.clone())
        .with_readiness(readiness.clone())
        .start(|_server| {
            registrations.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert_eq!(registrations.load(Ordering::SeqCst), 1);
    assert_eq!(wait_for_status(port).await, ServingStatus::Serving as i32);
    assert!(readiness.is_ready());
    assert!(handle.readiness().is_ready());
    assert!(tracing.calls().is_empty());
    assert!(!handle.tracing_enabled());

    handle.close(|| {}).await;
}

#[tokio::test]
#[serial]
async fn test_serves_on_hostname_address() {
    std::env::remove_var(APP_PORT_ENV);
    let port = free_port();
    let conf = configuration("svc1", &format!("localhost:{port}"), "");

    let handle = Engine::new("svc1", &conf)
        .with_tracing(RecordingTracing::default())
        .start(|_server| {})
        .unwrap();

    assert_eq!(
        wait_for_status_at(&format!("http://localhost:{port}")).await,
        ServingStatus::Serving as i32
    );

    handle.close(|| {}).await;
}

#[tokio::test]
#[serial]
async fn test_monitored_server_exports_request_metrics() {
    std::env::remove_var(APP_PORT_ENV);
    let port = free_port();
    let conf = configuration("svc-monitored", &format!("127.0.0.1:{port}"), "");

    let handle = Engine::new("svc-monitored", &conf)
        .monitor(true)
        .with_tracing(RecordingTracing::default())
        .start(|_server| {})
        .unwrap();
    assert_eq!(wait_for_status(port).await, ServingStatus::Serving as i32);

    let text = grpc_metrics::gather_text().unwrap();
    assert!(text.contains("grpc_server_requests_total"));
    assert!(text.contains(r#"service="grpc.health.v1.Health""#));
    assert!(text.contains(r#"method="Check""#));

    handle.close(|| {}).await;
}

#[tokio::test]
#[serial]
async fn test_tracing_initialized_only_with_tag() {
    std::env::remove_var(APP_PORT_ENV);
    let conf = configuration("svc1", "127.0.0.1:0", "zipkin");
    let tracing = RecordingTracing::default();

    let handle = Engine::new("svc1", &conf)
        .with_tracing(tracing.clone())
        .start(|_server| {})
        .unwrap();

    assert_eq!(
        tracing.calls(),
        vec![("svc1".to_string(), "zipkin".to_string())]
    );
    assert!(handle.tracing_enabled());

    handle.close(|| {}).await;
}

#[tokio::test]
#[serial]
async fn test_app_port_overrides_configured_address() {
    let configured = free_port();
    let overridden = free_port();
    let conf = configuration("svc1", &format!("127.0.0.1:{configured}"), "");

    std::env::set_var(APP_PORT_ENV, overridden.to_string());
    let handle = Engine::new("svc1", &conf)
        .with_tracing(RecordingTracing::default())
        .start(|_server| {})
        .unwrap();

    assert_eq!(wait_for_status(overridden).await, ServingStatus::Serving as i32);
    assert!(health_status(configured).await.is_err());

    handle.close(|| {}).await;
    std::env::remove_var(APP_PORT_ENV);
}

#[tokio::test]
#[serial]
async fn test_cleanup_runs_before_server_stops() {
    std::env::remove_var(APP_PORT_ENV);
    let port = free_port();
    let conf = configuration("svc1", &format!("127.0.0.1:{port}"), "");

    let handle = Engine::new("svc1", &conf)
        .with_tracing(RecordingTracing::default())
        .start(|_server| {})
        .unwrap();
    assert_eq!(wait_for_status(port).await, ServingStatus::Serving as i32);

    let served_during_cleanup = Arc::new(Mutex::new(None));
    let observed = served_during_cleanup.clone();
    handle
        .close(move || {
            let still_bound = std::net::TcpStream::connect(("127.0.0.1", port)).is_ok();
            *observed.lock().unwrap() = Some(still_bound);
        })
        .await;

    assert_eq!(*served_during_cleanup.lock().unwrap(), Some(true));
    assert!(health_status(port).await.is_err());
}

#[tokio::test]
#[serial]
async fn test_listen_failure_is_reported() {
    std::env::remove_var(APP_PORT_ENV);
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();
    let conf = configuration("svc-busy", &format!("127.0.0.1:{port}"), "");

    let result = try_app(|_server| {}, "svc-busy", &conf, std::future::pending()).await;

    assert!(matches!(result, Err(AppError::Listen(_))));
    drop(occupied);
}

#[tokio::test]
#[serial]
async fn test_invalid_app_port_is_reported() {
    let conf = configuration("svc1", "127.0.0.1:0", "");

    std::env::set_var(APP_PORT_ENV, "not-a-port");
    let result = try_app(|_server| {}, "svc1", &conf, std::future::pending()).await;
    std::env::remove_var(APP_PORT_ENV);

    assert!(matches!(result, Err(AppError::InvalidAddress { .. })));
}

#[tokio::test]
#[serial]
async fn test_supervised_mode_returns_after_signal() {
    std::env::remove_var(APP_PORT_ENV);
    let conf = configuration("svc1", "127.0.0.1:0", "");

    let result = try_app(
        |_server| {},
        "svc1",
        &conf,
        tokio::time::sleep(Duration::from_millis(100)),
    )
    .await;

    assert!(result.is_ok());
}
