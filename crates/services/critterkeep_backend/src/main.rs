// File: services/critterkeep_backend/src/main.rs
use std::sync::Arc;

use critterkeep_backend::{app, AppState};
use critterkeep_common::logging;
use critterkeep_config::load_config;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let config = Arc::new(load_config()?);
    let mut state = AppState::new(config.clone()).await?;
    let router = app(&state);
    let worker = state.take_notification_worker();
    // The router keeps its own handles; dropping ours lets the worker finish
    // once the server stops.
    drop(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Starting server at http://{}", addr);
    info!("API endpoints available at http://{}/api", addr);

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(worker) = worker {
        info!("Waiting for pending notifications");
        if let Err(e) = worker.await {
            error!("Notification worker ended abnormally: {}", e);
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
