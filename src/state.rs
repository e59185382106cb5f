//! Shared converter state
//!
//! Thread-safe state shared between HTTP handlers and the pipeline worker:
//! the loaded song, the displayed cover image, the single job slot, and the
//! progress scalar.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::cover::CoverImage;
use crate::events::{ConverterEvent, JobKind};

/// Fixed file name for preview renders, overwritten on every preview
pub const PREVIEW_FILE_NAME: &str = "preview.mp3";

/// Currently loaded song information (probed at load time)
#[derive(Debug, Clone)]
pub struct LoadedSong {
    /// Absolute path to the source MP3
    pub path: PathBuf,
    /// Display file name (last path component)
    pub file_name: String,
    /// Declared sample rate in Hz
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
    /// Duration in seconds, when the container declares a frame count
    pub duration_seconds: Option<f64>,
}

/// The job occupying the single conversion slot
#[derive(Debug, Clone, Copy)]
pub struct ActiveJob {
    pub job_id: Uuid,
    pub kind: JobKind,
}

/// Shared state accessible by all components
///
/// Uses RwLock for concurrent read access with rare writes. The job slot
/// uses a std Mutex so the RAII guard can release it from a blocking
/// worker's Drop.
pub struct SharedState {
    /// Currently loaded song (None until the first load)
    pub song: RwLock<Option<LoadedSong>>,

    /// Displayed cover image, already scaled to the thumbnail bounds
    pub cover: RwLock<Option<CoverImage>>,

    /// Single-slot task state: Some while a preview/export runs
    active_job: Mutex<Option<ActiveJob>>,

    /// Pipeline progress, 0-100
    progress: AtomicU8,

    /// Event broadcaster for SSE events
    pub event_tx: broadcast::Sender<ConverterEvent>,

    /// Directory receiving the fixed-named preview render
    work_dir: PathBuf,
}

impl SharedState {
    /// Create new shared state writing previews to the current directory
    pub fn new() -> Self {
        let work_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with_work_dir(work_dir)
    }

    /// Create new shared state with an explicit preview directory
    pub fn with_work_dir(work_dir: impl Into<PathBuf>) -> Self {
        let (event_tx, _) = broadcast::channel(100); // Buffer up to 100 events
        Self {
            song: RwLock::new(None),
            cover: RwLock::new(None),
            active_job: Mutex::new(None),
            progress: AtomicU8::new(0),
            event_tx,
            work_dir: work_dir.into(),
        }
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: ConverterEvent) {
        // Ignore send errors (no receivers is OK)
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<ConverterEvent> {
        self.event_tx.subscribe()
    }

    /// Path of the preview render inside the working directory
    pub fn preview_path(&self) -> PathBuf {
        self.work_dir.join(PREVIEW_FILE_NAME)
    }

    /// The working directory previews are written to
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Claim the job slot, or return None when a job is already running.
    ///
    /// The returned guard releases the slot and resets progress when
    /// dropped, including on worker panic.
    pub fn try_begin_job(self: &Arc<Self>, kind: JobKind) -> Option<JobGuard> {
        let mut slot = self
            .active_job
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.is_some() {
            return None;
        }
        let job_id = Uuid::new_v4();
        *slot = Some(ActiveJob { job_id, kind });
        drop(slot);

        self.progress.store(0, Ordering::Relaxed);
        Some(JobGuard {
            state: Arc::clone(self),
            job_id,
            kind,
        })
    }

    /// The job currently occupying the slot, if any
    pub fn active_job(&self) -> Option<ActiveJob> {
        *self
            .active_job
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current progress value (0-100)
    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::Relaxed)
    }

    fn release_job(&self) {
        let mut slot = self
            .active_job
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = None;
        drop(slot);
        self.progress.store(0, Ordering::Relaxed);
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII handle for the job slot
///
/// Held by the worker for the duration of one preview/export. Progress
/// updates go through the guard so every update carries the job identity.
pub struct JobGuard {
    state: Arc<SharedState>,
    job_id: Uuid,
    kind: JobKind,
}

impl JobGuard {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Store a progress checkpoint and broadcast it
    pub fn set_progress(&self, percent: u8) {
        let percent = percent.min(100);
        self.state.progress.store(percent, Ordering::Relaxed);
        self.state.broadcast_event(ConverterEvent::JobProgress {
            job_id: self.job_id,
            kind: self.kind,
            percent,
            timestamp: chrono::Utc::now(),
        });
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.state.release_job();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_job_slot_single_occupancy() {
        let state = Arc::new(SharedState::with_work_dir("/tmp"));

        let guard = state.try_begin_job(JobKind::Preview).unwrap();
        assert!(state.active_job().is_some());

        // Second claim is refused while the slot is held
        assert!(state.try_begin_job(JobKind::Export).is_none());

        drop(guard);
        assert!(state.active_job().is_none());

        // Slot is reusable after release
        assert!(state.try_begin_job(JobKind::Export).is_some());
    }

    #[tokio::test]
    async fn test_progress_resets_on_release() {
        let state = Arc::new(SharedState::with_work_dir("/tmp"));

        let guard = state.try_begin_job(JobKind::Export).unwrap();
        guard.set_progress(60);
        assert_eq!(state.progress(), 60);

        drop(guard);
        assert_eq!(state.progress(), 0);
    }

    #[tokio::test]
    async fn test_progress_clamped_to_100() {
        let state = Arc::new(SharedState::with_work_dir("/tmp"));

        let guard = state.try_begin_job(JobKind::Preview).unwrap();
        guard.set_progress(250);
        assert_eq!(state.progress(), 100);
    }

    #[tokio::test]
    async fn test_progress_event_broadcast() {
        let state = Arc::new(SharedState::with_work_dir("/tmp"));
        let mut rx = state.subscribe_events();

        let guard = state.try_begin_job(JobKind::Preview).unwrap();
        guard.set_progress(30);

        match rx.try_recv().unwrap() {
            ConverterEvent::JobProgress { percent, kind, .. } => {
                assert_eq!(percent, 30);
                assert_eq!(kind, JobKind::Preview);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_preview_path_uses_work_dir() {
        let state = SharedState::with_work_dir("/some/dir");
        assert_eq!(
            state.preview_path(),
            PathBuf::from("/some/dir").join(PREVIEW_FILE_NAME)
        );
    }
}
