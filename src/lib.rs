//! nightcore library - MP3 speed/pitch converter
//!
//! Loads an MP3, raises speed and pitch by a fixed 1.25 factor via
//! sample-rate reinterpretation, and previews the first 15 seconds or
//! exports the full result to a chosen path, embedding cover art into the
//! output's ID3 tag when one is loaded. Served as a localhost web tool
//! with an embedded single-page UI.

use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub mod api;
pub mod audio;
pub mod cover;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod state;

use state::SharedState;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Converter state: loaded song, cover, job slot, progress
    pub state: Arc<SharedState>,
}

impl AppState {
    /// Create new application state
    pub fn new(state: Arc<SharedState>) -> Self {
        Self { state }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        // Embedded UI
        .route("/", get(api::serve_index))
        .route("/app.js", get(api::serve_app_js))
        // Health and status
        .route("/health", get(api::health_check))
        .route("/build_info", get(api::get_build_info))
        .route("/status", get(api::get_status))
        // File chooser
        .route("/files/browse", get(api::browse_files))
        // Converter commands
        .route("/song/load", post(api::load_song))
        .route("/cover/load", post(api::load_cover))
        .route("/cover", get(api::get_cover))
        .route("/preview", post(api::start_preview))
        .route("/export", post(api::start_export))
        // SSE events
        .route("/events", get(api::event_stream))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
