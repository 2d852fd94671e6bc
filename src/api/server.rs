//! Server lifecycle: bind the configured address, serve the router, shut
//! down gracefully on SIGINT.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::api::router::api_router;
use crate::state::AppState;

/// Bind and serve until a shutdown signal arrives.
pub async fn serve(state: Arc<AppState>) -> Result<(), String> {
    let addr: SocketAddr = state
        .settings
        .bind_addr
        .parse()
        .map_err(|e| format!("Invalid bind address {}: {e}", state.settings.bind_addr))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind {addr}: {e}"))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to read bound address: {e}"))?;
    tracing::info!(%local_addr, "API server listening");

    let app = api_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("Server error: {e}"))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Shutdown signal received");
    }
}
