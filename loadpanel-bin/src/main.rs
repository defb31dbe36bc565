//! HTTP server for the sandboxed load-generation panel.

use std::net::SocketAddr;
use std::sync::Arc;

use loadpanel_runtime::LoadPanel;
use loadpanel_runtime::api::router;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_log();

    let bind = std::env::var("PANEL_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PANEL_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(6050);
    let addr: SocketAddr = format!("{bind}:{port}")
        .parse()
        .map_err(|err| format!("invalid PANEL_BIND/PANEL_PORT ({bind}:{port}): {err}"))?;

    let panel = Arc::new(LoadPanel::new());

    info!("starting load panel on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(panel))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
        return;
    }
    info!("shutting down load panel");
}

fn setup_log() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};
    if tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .is_err()
    {}
}
