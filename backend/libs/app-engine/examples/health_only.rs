//! Minimal service exposing only the health endpoint
//!
//! ```bash
//! AppPort=50051 cargo run -p app-engine --example health_only
//!
//! # In another terminal
//! grpcurl -plaintext localhost:50051 grpc.health.v1.Health/Check
//! ```

use app_engine::{app, Configuration};

const SYSTEM_ID: &str = "health-only";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let conf = Configuration::load(SYSTEM_ID)?;

    app(
        |server| {
            tracing::info!(addr = %server.config().addr, "No application services to register");
        },
        SYSTEM_ID,
        &conf,
    )
    .await;

    Ok(())
}
