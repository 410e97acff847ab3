//! Web server setup and routing

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use crate::api;
use crate::config::TlsConfig;
use crate::state::AppState;
use crate::ws;

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // API routes
        .route("/api/devices", get(api::list_devices))
        .route("/api/devices/{ip}", get(api::get_device))
        .route("/api/scan", post(api::trigger_scan))
        .route("/api/topology", get(api::get_topology))
        .route("/api/status", get(api::get_status))
        .route("/api/interfaces", get(api::list_interfaces))
        // WebSocket for live inventory pushes
        .route("/ws", get(ws::websocket_handler))
        // Static dashboard files
        .fallback_service(ServeDir::new(&state.config.daemon.web_root))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the web server (HTTP or HTTPS depending on config) until shutdown
pub async fn run(state: Arc<AppState>, bind: &str, tls: Option<&TlsConfig>) -> Result<()> {
    let app = router(state.clone());
    let shutdown = state.scanner.shutdown_token();

    // Start discovery in background
    let discovery = &state.config.discovery;
    let periodic = state
        .scanner
        .start_periodic_scan(discovery.ip_range.clone(), discovery.interval());

    let served = if let Some(tls_config) = tls {
        run_https(app, bind, tls_config, shutdown.clone()).await
    } else {
        run_http(app, bind, shutdown.clone()).await
    };

    // A server error still has to stop the scanner
    shutdown.cancel();
    if let Err(e) = periodic.await {
        tracing::error!(error = %e, "Periodic scan task failed");
    }

    served
}

/// Run plain HTTP server
async fn run_http(app: Router, bind: &str, shutdown: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %bind, protocol = "HTTP", "Starting web server");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

/// Run HTTPS server with TLS
async fn run_https(
    app: Router,
    bind: &str,
    tls: &TlsConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::path::PathBuf;

    let cert_path = PathBuf::from(&tls.cert);
    let key_path = PathBuf::from(&tls.key);

    if !cert_path.exists() {
        anyhow::bail!("TLS certificate file not found: {}", tls.cert);
    }
    if !key_path.exists() {
        anyhow::bail!("TLS key file not found: {}", tls.key);
    }

    let rustls_config = RustlsConfig::from_pem_file(&cert_path, &key_path).await?;

    let addr: std::net::SocketAddr = bind.parse()?;
    info!(address = %bind, protocol = "HTTPS", cert = %tls.cert, "Starting web server with TLS");

    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        shutdown.cancelled().await;
        shutdown_handle.graceful_shutdown(Some(Duration::from_secs(5)));
    });

    axum_server::bind_rustls(addr, rustls_config)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
