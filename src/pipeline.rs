//! Conversion pipeline
//!
//! Job bodies for the two conversions: preview (first 15 seconds, played
//! through the default output device) and export (full song written to a
//! caller-chosen path with the displayed cover embedded).
//!
//! Jobs run on the blocking pool and report progress through the
//! [`JobGuard`] at fixed checkpoints: 5 (started), 20 (decoded), 30
//! (shift started), 60 (shifted), 80 (encoded), 90 (written), 100 (done).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use crate::audio::decoder::SongDecoder;
use crate::audio::encoder::Mp3Encoder;
use crate::audio::player::Player;
use crate::audio::{nightcore, AudioBuffer};
use crate::cover::{self, CoverImage};
use crate::error::Result;
use crate::events::ConverterEvent;
use crate::state::{JobGuard, LoadedSong, SharedState};

/// Preview length in seconds
pub const PREVIEW_SECONDS: f64 = 15.0;

/// Decode the loaded song and apply the speed shift
fn transform_song(song: &LoadedSong, guard: &JobGuard) -> Result<AudioBuffer> {
    guard.set_progress(5);

    let buffer = SongDecoder::decode_file(&song.path)?;
    guard.set_progress(20);
    info!(
        "Decoded {}: {} frames at {} Hz, {} channel(s)",
        song.file_name,
        buffer.frames(),
        buffer.sample_rate,
        buffer.channels
    );

    guard.set_progress(30);
    let shifted = nightcore::apply(&buffer)?;
    guard.set_progress(60);

    Ok(shifted)
}

/// Render the first [`PREVIEW_SECONDS`] of the shifted song to `preview_path`
pub fn render_preview(song: &LoadedSong, preview_path: &Path, guard: &JobGuard) -> Result<()> {
    let mut shifted = transform_song(song, guard)?;
    shifted.truncate_to_seconds(PREVIEW_SECONDS);

    let mp3 = Mp3Encoder::encode(&shifted)?;
    guard.set_progress(80);

    std::fs::write(preview_path, &mp3)?;
    guard.set_progress(90);
    info!("Wrote preview to {}", preview_path.display());

    Ok(())
}

/// Preview job body: render the preview file, then play it.
///
/// Playback decodes the rendered file rather than reusing the in-memory
/// buffer, so what plays is exactly what was encoded.
pub fn run_preview(state: &SharedState, guard: &JobGuard, song: &LoadedSong) -> Result<()> {
    let preview_path = state.preview_path();
    render_preview(song, &preview_path, guard)?;

    let rendered = SongDecoder::decode_file(&preview_path)?;
    Player::play_buffer(&rendered)?;
    guard.set_progress(100);

    Ok(())
}

/// Export job body: write the whole shifted song to `output_path` and
/// embed the displayed cover when one is set.
pub fn run_export(
    guard: &JobGuard,
    song: &LoadedSong,
    cover: Option<&CoverImage>,
    output_path: &Path,
) -> Result<()> {
    let shifted = transform_song(song, guard)?;

    let mp3 = Mp3Encoder::encode(&shifted)?;
    guard.set_progress(80);

    std::fs::write(output_path, &mp3)?;
    guard.set_progress(90);
    info!("Wrote export to {}", output_path.display());

    if let Some(cover) = cover {
        cover::embed_cover(output_path, cover)?;
    }
    guard.set_progress(100);

    Ok(())
}

/// Spawn the preview job on the blocking pool.
///
/// Emits `JobStarted` immediately; the worker emits `JobCompleted` or
/// `JobFailed` when it finishes. The guard travels into the worker and
/// frees the job slot on drop, panics included.
pub fn spawn_preview(state: Arc<SharedState>, guard: JobGuard, song: LoadedSong) {
    state.broadcast_event(ConverterEvent::JobStarted {
        job_id: guard.job_id(),
        kind: guard.kind(),
        timestamp: chrono::Utc::now(),
    });

    tokio::task::spawn_blocking(move || {
        match run_preview(&state, &guard, &song) {
            Ok(()) => {
                info!("Preview job {} completed", guard.job_id());
                state.broadcast_event(ConverterEvent::JobCompleted {
                    job_id: guard.job_id(),
                    kind: guard.kind(),
                    output_path: None,
                    timestamp: chrono::Utc::now(),
                });
            }
            Err(e) => {
                let message = format!("Failed to create preview: {}", e);
                error!("{}", message);
                state.broadcast_event(ConverterEvent::JobFailed {
                    job_id: guard.job_id(),
                    kind: guard.kind(),
                    message,
                    timestamp: chrono::Utc::now(),
                });
            }
        }
        drop(guard);
    });
}

/// Spawn the export job on the blocking pool.
pub fn spawn_export(
    state: Arc<SharedState>,
    guard: JobGuard,
    song: LoadedSong,
    cover: Option<CoverImage>,
    output_path: PathBuf,
) {
    state.broadcast_event(ConverterEvent::JobStarted {
        job_id: guard.job_id(),
        kind: guard.kind(),
        timestamp: chrono::Utc::now(),
    });

    tokio::task::spawn_blocking(move || {
        match run_export(&guard, &song, cover.as_ref(), &output_path) {
            Ok(()) => {
                info!("Export job {} completed", guard.job_id());
                state.broadcast_event(ConverterEvent::JobCompleted {
                    job_id: guard.job_id(),
                    kind: guard.kind(),
                    output_path: Some(output_path.display().to_string()),
                    timestamp: chrono::Utc::now(),
                });
            }
            Err(e) => {
                let message = format!("Failed to export song: {}", e);
                error!("{}", message);
                state.broadcast_event(ConverterEvent::JobFailed {
                    job_id: guard.job_id(),
                    kind: guard.kind(),
                    message,
                    timestamp: chrono::Utc::now(),
                });
            }
        }
        drop(guard);
    });
}
