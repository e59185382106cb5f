//! HTTP API handlers for the converter

pub mod browse;
pub mod buildinfo;
pub mod handlers;
pub mod sse;
pub mod ui;

pub use browse::browse_files;
pub use buildinfo::get_build_info;
pub use handlers::{
    get_cover, get_status, health_check, load_cover, load_song, start_export, start_preview,
};
pub use sse::event_stream;
pub use ui::{serve_app_js, serve_index};
