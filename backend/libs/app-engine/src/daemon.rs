//! Run-until-interrupted driver with no gRPC machinery

use crate::signal::shutdown_signal;
use std::future::Future;
use tracing::info;

/// Invoke `handle`, block until an interrupt signal, then invoke `close`
pub async fn daemon<H, C>(handle: H, close: C)
where
    H: FnOnce(),
    C: FnOnce(),
{
    daemon_until(handle, close, shutdown_signal()).await
}

/// Same as [`daemon`] with an explicit stop signal
pub async fn daemon_until<H, C, S>(handle: H, close: C, signal: S)
where
    H: FnOnce(),
    C: FnOnce(),
    S: Future<Output = ()>,
{
    info!("Daemon Engine starting");
    handle();

    signal.await;

    close();
    info!("Daemon Engine shut down");
}
