//! Server startup and lifecycle

use crate::{routes, AppState, GatewayConfig};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Run the gateway until `shutdown_signal` resolves
pub async fn run_server(
    config: GatewayConfig,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(config.clone()).await?);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("🚀 Stowage gateway listening on http://{}", addr);

    serve(listener, state, shutdown_signal).await?;

    info!("👋 Gateway shutdown complete");
    Ok(())
}

/// Serve the file API on an already bound listener
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = routes::create_router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
}
