//! HTTP server entry point.

use axum::Router;
use std::net::SocketAddr;
use tracing::info;

/// Bind `addr` and serve the router until the task is cancelled.
pub async fn serve(router: Router, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "consensus RPC listening");
    axum::serve(listener, router).await
}
