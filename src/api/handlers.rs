//! HTTP request handlers
//!
//! Implements the converter command endpoints: load a song, load cover
//! art, start a preview or export, and report status. Handlers validate,
//! mutate state or spawn a job, and answer JSON; presentation lives in
//! the UI.

use axum::{extract::State, http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audio::decoder::SongDecoder;
use crate::cover::{self, CoverImage};
use crate::error::{ApiError, ApiResult};
use crate::events::{ConverterEvent, JobKind};
use crate::pipeline;
use crate::state::LoadedSong;
use crate::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct LoadSongRequest {
    pub file_path: String,
}

/// Outcome of the cover scan performed during song load
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CoverState {
    /// An APIC frame was found and decoded
    Loaded,
    /// The file carries no picture frame
    None,
    /// A picture frame exists but its image data is unreadable
    Error,
}

#[derive(Debug, Serialize)]
pub struct SongInfo {
    pub file_name: String,
    pub path: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_seconds: Option<f64>,
}

impl From<&LoadedSong> for SongInfo {
    fn from(song: &LoadedSong) -> Self {
        Self {
            file_name: song.file_name.clone(),
            path: song.path.display().to_string(),
            sample_rate: song.sample_rate,
            channels: song.channels,
            duration_seconds: song.duration_seconds,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoadSongResponse {
    pub status: String,
    pub song: SongInfo,
    pub cover: CoverState,
}

#[derive(Debug, Deserialize)]
pub struct LoadCoverRequest {
    pub file_path: String,
}

#[derive(Debug, Serialize)]
pub struct LoadCoverResponse {
    pub status: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub output_path: String,
}

/// Answer for accepted preview/export requests
#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub status: String,
    pub job_id: Uuid,
    pub kind: JobKind,
}

#[derive(Debug, Serialize)]
pub struct JobInfo {
    pub job_id: Uuid,
    pub kind: JobKind,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub song: Option<SongInfo>,
    pub has_cover: bool,
    pub busy: bool,
    pub job: Option<JobInfo>,
    pub progress: u8,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health - module health check
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "nightcore".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /status - loaded song, cover presence, job state, progress
pub async fn get_status(State(ctx): State<AppState>) -> Json<StatusResponse> {
    let song = ctx.state.song.read().await.as_ref().map(SongInfo::from);
    let has_cover = ctx.state.cover.read().await.is_some();
    let job = ctx.state.active_job().map(|j| JobInfo {
        job_id: j.job_id,
        kind: j.kind,
    });

    Json(StatusResponse {
        song,
        has_cover,
        busy: job.is_some(),
        job,
        progress: ctx.state.progress(),
    })
}

/// POST /song/load - validate and probe an MP3, then scan its cover art
///
/// A cover frame that fails to decode degrades to the "error" cover state;
/// the song still loads.
pub async fn load_song(
    State(ctx): State<AppState>,
    Json(req): Json<LoadSongRequest>,
) -> ApiResult<Json<LoadSongResponse>> {
    info!("Load song request: {}", req.file_path);

    if req.file_path.trim().is_empty() {
        return Err(ApiError::BadRequest("No file path provided".to_string()));
    }
    let path = PathBuf::from(&req.file_path);
    if !path.is_file() {
        return Err(ApiError::NotFound(format!(
            "File not found: {}",
            path.display()
        )));
    }

    let probed = SongDecoder::probe_file(&path)
        .map_err(|e| ApiError::BadRequest(format!("Failed to load song: {}", e)))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| req.file_path.clone());

    let (new_cover, cover_state) = match cover::extract_cover(&path) {
        Ok(Some(image)) => (Some(image), CoverState::Loaded),
        Ok(None) => (None, CoverState::None),
        Err(e) => {
            warn!("Cover extraction failed for {}: {}", path.display(), e);
            (None, CoverState::Error)
        }
    };
    let has_cover = cover_state == CoverState::Loaded;

    let song = LoadedSong {
        path,
        file_name: file_name.clone(),
        sample_rate: probed.sample_rate,
        channels: probed.channels,
        duration_seconds: probed.duration_seconds,
    };
    let song_info = SongInfo::from(&song);

    *ctx.state.song.write().await = Some(song);
    *ctx.state.cover.write().await = new_cover;

    info!(
        "Loaded {}: {} Hz, {} channel(s), cover {:?}",
        file_name, probed.sample_rate, probed.channels, cover_state
    );

    ctx.state.broadcast_event(ConverterEvent::SongLoaded {
        file_name,
        sample_rate: probed.sample_rate,
        channels: probed.channels,
        duration_seconds: probed.duration_seconds,
        has_cover,
        timestamp: chrono::Utc::now(),
    });
    ctx.state.broadcast_event(ConverterEvent::CoverChanged {
        present: has_cover,
        timestamp: chrono::Utc::now(),
    });

    Ok(Json(LoadSongResponse {
        status: "ok".to_string(),
        song: song_info,
        cover: cover_state,
    }))
}

/// POST /cover/load - replace the displayed cover with a user-chosen image
pub async fn load_cover(
    State(ctx): State<AppState>,
    Json(req): Json<LoadCoverRequest>,
) -> ApiResult<Json<LoadCoverResponse>> {
    if ctx.state.song.read().await.is_none() {
        return Err(ApiError::BadRequest(
            "Please select a song first".to_string(),
        ));
    }
    if req.file_path.trim().is_empty() {
        return Err(ApiError::BadRequest("No file path provided".to_string()));
    }
    let path = PathBuf::from(&req.file_path);
    if !path.is_file() {
        return Err(ApiError::NotFound(format!(
            "File not found: {}",
            path.display()
        )));
    }

    let cover = CoverImage::from_path(&path)
        .map_err(|e| ApiError::BadRequest(format!("Failed to load image: {}", e)))?;
    let (width, height) = (cover.width(), cover.height());

    *ctx.state.cover.write().await = Some(cover);
    ctx.state.broadcast_event(ConverterEvent::CoverChanged {
        present: true,
        timestamp: chrono::Utc::now(),
    });

    info!("Cover art loaded from {} ({}x{})", path.display(), width, height);
    Ok(Json(LoadCoverResponse {
        status: "ok".to_string(),
        width,
        height,
    }))
}

/// GET /cover - the displayed thumbnail as PNG, 404 when absent
pub async fn get_cover(State(ctx): State<AppState>) -> ApiResult<Response> {
    let cover = ctx.state.cover.read().await.clone();
    match cover {
        Some(image) => {
            let png = image.to_png()?;
            Ok(([("content-type", "image/png")], png).into_response())
        }
        None => Err(ApiError::NotFound("No cover art loaded".to_string())),
    }
}

/// POST /preview - render and play the first 15 seconds
///
/// Answers 202 with the job id, 400 when no song is loaded, 409 while
/// another job holds the slot.
pub async fn start_preview(
    State(ctx): State<AppState>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let song = ctx
        .state
        .song
        .read()
        .await
        .clone()
        .ok_or_else(|| ApiError::BadRequest("Please select a song first".to_string()))?;

    let guard = ctx
        .state
        .try_begin_job(JobKind::Preview)
        .ok_or_else(|| ApiError::Conflict("A conversion is already running".to_string()))?;

    let job_id = guard.job_id();
    info!("Starting preview job {} for {}", job_id, song.file_name);
    pipeline::spawn_preview(Arc::clone(&ctx.state), guard, song);

    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            status: "started".to_string(),
            job_id,
            kind: JobKind::Preview,
        }),
    ))
}

/// POST /export - write the full shifted song to the requested path
///
/// A bare file name without extension gets ".mp3" appended. The target
/// directory must already exist.
pub async fn start_export(
    State(ctx): State<AppState>,
    Json(req): Json<ExportRequest>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let song = ctx
        .state
        .song
        .read()
        .await
        .clone()
        .ok_or_else(|| ApiError::BadRequest("Please select a song first".to_string()))?;

    if req.output_path.trim().is_empty() {
        return Err(ApiError::BadRequest("No output path provided".to_string()));
    }
    let mut output_path = PathBuf::from(&req.output_path);
    if output_path.extension().is_none() {
        output_path.set_extension("mp3");
    }
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            return Err(ApiError::BadRequest(format!(
                "Directory does not exist: {}",
                parent.display()
            )));
        }
    }

    let cover = ctx.state.cover.read().await.clone();

    let guard = ctx
        .state
        .try_begin_job(JobKind::Export)
        .ok_or_else(|| ApiError::Conflict("A conversion is already running".to_string()))?;

    let job_id = guard.job_id();
    info!(
        "Starting export job {} for {} -> {}",
        job_id,
        song.file_name,
        output_path.display()
    );
    pipeline::spawn_export(Arc::clone(&ctx.state), guard, song, cover, output_path);

    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            status: "started".to_string(),
            job_id,
            kind: JobKind::Export,
        }),
    ))
}
