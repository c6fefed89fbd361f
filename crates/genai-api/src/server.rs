//! Gateway HTTP server

use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware;
use axum::routing::{any, get};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use genai_common::config::TlsConfig;
use tracing::info;

use crate::auth::attach_identity;
use crate::error::Error;
use crate::gateway::{mcp_handler, RequestGateway};

/// Route serving MCP services
pub const MCP_ROUTE: &str = "/api/v1/mcp/{namespace}/{service}";

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind the server
    pub addr: SocketAddr,
    /// Serve HTTPS with this certificate and key when set
    pub tls: Option<TlsConfig>,
}

/// Shared state for handlers
#[derive(Clone)]
pub struct AppState {
    /// Request pipeline
    pub gateway: Arc<RequestGateway>,
}

/// Build the gateway router
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/healthz", get(|| async { "ok" }))
        .route(MCP_ROUTE, any(mcp_handler))
        .layer(middleware::from_fn(attach_identity))
        .with_state(state)
}

/// Start the gateway server
pub async fn start_server(config: ServerConfig, state: AppState) -> Result<(), Error> {
    let app = router(state);

    match config.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                .await
                .map_err(|e| Error::Internal(format!("TLS config error: {}", e)))?;

            info!(addr = %config.addr, "Starting MCP gateway (https)");

            axum_server::bind_rustls(config.addr, tls_config)
                .serve(app.into_make_service())
                .await
                .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(config.addr)
                .await
                .map_err(|e| Error::Internal(format!("failed to bind {}: {}", config.addr, e)))?;

            info!(addr = %config.addr, "Starting MCP gateway (http)");

            axum::serve(listener, app)
                .await
                .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;
        }
    }

    Ok(())
}
