//! Integration tests for the conversion pipeline
//!
//! Exercises the full decode -> shift -> encode -> write path against
//! synthesized fixtures, plus cover embedding on export and slot release
//! on failure. Playback (audio hardware) stays untested.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use nightcore::audio::decoder::SongDecoder;
use nightcore::audio::encoder::Mp3Encoder;
use nightcore::audio::AudioBuffer;
use nightcore::cover::{self, CoverImage};
use nightcore::events::{ConverterEvent, JobKind};
use nightcore::pipeline;
use nightcore::state::{JobGuard, LoadedSong, SharedState};

/// Test fixture: sine tone buffer
fn sine_buffer(seconds: f64, sample_rate: u32, channels: u16) -> AudioBuffer {
    let frames = (seconds * sample_rate as f64) as usize;
    let mut samples = Vec::with_capacity(frames * channels as usize);
    for i in 0..frames {
        let t = i as f64 / sample_rate as f64;
        let value = (2.0 * std::f64::consts::PI * 440.0 * t).sin() as f32 * 0.5;
        for _ in 0..channels {
            samples.push(value);
        }
    }
    AudioBuffer::new(samples, sample_rate, channels)
}

fn write_fixture_mp3(path: &Path, seconds: f64, sample_rate: u32, channels: u16) {
    let buffer = sine_buffer(seconds, sample_rate, channels);
    Mp3Encoder::encode_to_file(&buffer, path).expect("Should write fixture");
}

fn loaded_song(path: &Path, sample_rate: u32, channels: u16) -> LoadedSong {
    LoadedSong {
        path: path.to_path_buf(),
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        sample_rate,
        channels,
        duration_seconds: None,
    }
}

fn test_cover() -> CoverImage {
    let img = image::RgbaImage::from_fn(400, 300, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 64, 255])
    });
    let mut png = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut png, image::ImageFormat::Png)
        .unwrap();
    CoverImage::from_bytes(&png.into_inner()).unwrap()
}

fn begin_job(state: &Arc<SharedState>, kind: JobKind) -> JobGuard {
    state.try_begin_job(kind).expect("slot should be free")
}

fn scratch() -> (Arc<SharedState>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let state = Arc::new(SharedState::with_work_dir(dir.path()));
    (state, dir)
}

// =============================================================================
// Preview Rendering
// =============================================================================

#[test]
fn test_render_preview_shortens_duration() {
    let (state, dir) = scratch();
    let song_path = dir.path().join("tone.mp3");
    write_fixture_mp3(&song_path, 2.0, 44100, 2);

    let guard = begin_job(&state, JobKind::Preview);
    let preview_path = state.preview_path();
    pipeline::render_preview(&loaded_song(&song_path, 44100, 2), &preview_path, &guard)
        .expect("render should succeed");

    // Last checkpoint before playback is 90
    assert_eq!(state.progress(), 90);

    let rendered = SongDecoder::decode_file(&preview_path).unwrap();
    assert_eq!(rendered.sample_rate, 44100);
    let expected = 2.0 / 1.25;
    assert!(
        (rendered.duration_seconds() - expected).abs() < 0.15,
        "duration {} != {}",
        rendered.duration_seconds(),
        expected
    );

    drop(guard);
    assert_eq!(state.progress(), 0);
}

#[test]
fn test_render_preview_caps_at_fifteen_seconds() {
    let (state, dir) = scratch();
    let song_path = dir.path().join("long.mp3");
    // 25 s shifts to 20 s, which the preview must cap
    write_fixture_mp3(&song_path, 25.0, 22050, 1);

    let guard = begin_job(&state, JobKind::Preview);
    let preview_path = state.preview_path();
    pipeline::render_preview(&loaded_song(&song_path, 22050, 1), &preview_path, &guard)
        .expect("render should succeed");

    let rendered = SongDecoder::decode_file(&preview_path).unwrap();
    assert_eq!(rendered.sample_rate, 22050);
    assert!(
        rendered.duration_seconds() <= pipeline::PREVIEW_SECONDS + 0.2,
        "preview runs {} seconds",
        rendered.duration_seconds()
    );
    assert!(rendered.duration_seconds() > pipeline::PREVIEW_SECONDS - 0.5);
}

#[test]
fn test_render_preview_overwrites_previous_file() {
    let (state, dir) = scratch();
    let song_path = dir.path().join("tone.mp3");
    write_fixture_mp3(&song_path, 1.0, 44100, 2);
    let preview_path = state.preview_path();
    std::fs::write(&preview_path, b"stale preview").unwrap();

    let guard = begin_job(&state, JobKind::Preview);
    pipeline::render_preview(&loaded_song(&song_path, 44100, 2), &preview_path, &guard)
        .expect("render should succeed");

    let rendered = SongDecoder::decode_file(&preview_path).unwrap();
    assert!(!rendered.is_empty());
}

// =============================================================================
// Export
// =============================================================================

#[test]
fn test_export_without_cover_has_no_apic() {
    let (state, dir) = scratch();
    let song_path = dir.path().join("tone.mp3");
    write_fixture_mp3(&song_path, 1.0, 44100, 2);
    let out_path = dir.path().join("out.mp3");

    let guard = begin_job(&state, JobKind::Export);
    pipeline::run_export(&guard, &loaded_song(&song_path, 44100, 2), None, &out_path)
        .expect("export should succeed");

    assert!(out_path.is_file());
    assert!(cover::extract_cover(&out_path).unwrap().is_none());
}

#[test]
fn test_export_embeds_displayed_cover() {
    let (state, dir) = scratch();
    let song_path = dir.path().join("tone.mp3");
    write_fixture_mp3(&song_path, 1.0, 44100, 2);
    let out_path = dir.path().join("out.mp3");

    let cover_image = test_cover();
    let guard = begin_job(&state, JobKind::Export);
    pipeline::run_export(
        &guard,
        &loaded_song(&song_path, 44100, 2),
        Some(&cover_image),
        &out_path,
    )
    .expect("export should succeed");

    // Exactly one front-cover JPEG frame matching the displayed thumbnail
    let tag = id3::Tag::read_from_path(&out_path).unwrap();
    let pictures: Vec<_> = tag.pictures().collect();
    assert_eq!(pictures.len(), 1);
    assert_eq!(pictures[0].mime_type, "image/jpeg");
    assert_eq!(
        pictures[0].picture_type,
        id3::frame::PictureType::CoverFront
    );

    let embedded = image::load_from_memory(&pictures[0].data).unwrap();
    assert_eq!(embedded.width(), cover_image.width());
    assert_eq!(embedded.height(), cover_image.height());

    // The tagged file still decodes with the shortened duration
    let exported = SongDecoder::decode_file(&out_path).unwrap();
    assert_eq!(exported.sample_rate, 44100);
    let expected = 1.0 / 1.25;
    assert!((exported.duration_seconds() - expected).abs() < 0.15);
}

#[test]
fn test_export_reaches_full_progress_before_release() {
    let (state, dir) = scratch();
    let song_path = dir.path().join("tone.mp3");
    write_fixture_mp3(&song_path, 1.0, 44100, 2);
    let out_path = dir.path().join("out.mp3");

    let guard = begin_job(&state, JobKind::Export);
    pipeline::run_export(&guard, &loaded_song(&song_path, 44100, 2), None, &out_path).unwrap();

    assert_eq!(state.progress(), 100);
    drop(guard);
    assert_eq!(state.progress(), 0);
    assert!(state.active_job().is_none());
}

// =============================================================================
// Failure Handling
// =============================================================================

#[tokio::test]
async fn test_failed_export_releases_slot_and_reports() {
    let (state, dir) = scratch();
    let missing = dir.path().join("gone.mp3");
    let out_path = dir.path().join("out.mp3");

    let mut events = state.subscribe_events();
    let guard = begin_job(&state, JobKind::Export);
    pipeline::spawn_export(
        Arc::clone(&state),
        guard,
        loaded_song(&missing, 44100, 2),
        None,
        out_path.clone(),
    );

    let message = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match events.recv().await.expect("event stream closed") {
                ConverterEvent::JobFailed { message, .. } => break message,
                ConverterEvent::JobCompleted { .. } => panic!("export should have failed"),
                _ => {}
            }
        }
    })
    .await
    .expect("no failure event within 10 seconds");
    assert!(
        message.starts_with("Failed to export song:"),
        "{}",
        message
    );
    assert!(!out_path.exists());

    // The guard dropped inside the worker; the slot must be free again
    for _ in 0..100 {
        if state.active_job().is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(state.active_job().is_none());
    assert_eq!(state.progress(), 0);
}

// =============================================================================
// Round Trip
// =============================================================================

#[test]
fn test_encode_decode_round_trip_preserves_rate_and_length() {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().join("roundtrip.mp3");

    let buffer = sine_buffer(1.5, 44100, 2);
    let data = Mp3Encoder::encode(&buffer).unwrap();
    std::fs::write(&path, data).unwrap();

    let decoded = SongDecoder::decode_file(&path).unwrap();
    assert_eq!(decoded.sample_rate, 44100);
    assert_eq!(decoded.channels, 2);
    assert!((decoded.duration_seconds() - 1.5).abs() < 0.1);
}
