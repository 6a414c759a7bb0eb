pub mod chart;
pub mod handlers;
pub mod routes;
pub mod session;
pub mod state;
pub mod static_files;
pub mod templates;

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::WebConfig;
use state::AppState;

pub async fn run_server(config: &WebConfig, state: Arc<AppState>) -> std::io::Result<()> {
    let app = routes::app(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}
