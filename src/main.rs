//! nightcore - MP3 speed/pitch converter
//!
//! Zero-config startup: binds the UI and API to a fixed localhost port,
//! writes preview renders to the current directory, and needs no flags or
//! config file. Log verbosity follows RUST_LOG.

use anyhow::Result;
use nightcore::state::SharedState;
use nightcore::{build_router, AppState};
use std::sync::Arc;
use tokio::signal;
use tracing::info;

const PORT: u16 = 5727;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting Nightcore Converter v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let state = Arc::new(SharedState::new());
    info!(
        "Preview renders go to {}",
        state.preview_path().display()
    );

    let app = build_router(AppState::new(state));

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", PORT)).await?;
    info!("nightcore listening on http://127.0.0.1:{}", PORT);
    info!("Health check: http://127.0.0.1:{}/health", PORT);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
