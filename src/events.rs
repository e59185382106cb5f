//! Event types for the converter event system
//!
//! Events are broadcast to SSE clients so the UI can react to song loads,
//! job progress, and job completion without polling alone.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of conversion job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Preview,
    Export,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Preview => write!(f, "preview"),
            JobKind::Export => write!(f, "export"),
        }
    }
}

/// Converter event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConverterEvent {
    /// A song was loaded and probed
    SongLoaded {
        file_name: String,
        sample_rate: u32,
        channels: u16,
        /// Absent when the container does not declare a frame count
        duration_seconds: Option<f64>,
        has_cover: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The displayed cover image changed (loaded, replaced, or cleared)
    CoverChanged {
        present: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A preview or export job was accepted and spawned
    JobStarted {
        job_id: Uuid,
        kind: JobKind,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Pipeline progress update (0-100)
    JobProgress {
        job_id: Uuid,
        kind: JobKind,
        percent: u8,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Job finished successfully
    JobCompleted {
        job_id: Uuid,
        kind: JobKind,
        /// Output path for exports; preview plays in place
        output_path: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Job failed; message carries the underlying error text
    JobFailed {
        job_id: Uuid,
        kind: JobKind,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ConverterEvent {
    /// Event type string used as the SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            ConverterEvent::SongLoaded { .. } => "SongLoaded",
            ConverterEvent::CoverChanged { .. } => "CoverChanged",
            ConverterEvent::JobStarted { .. } => "JobStarted",
            ConverterEvent::JobProgress { .. } => "JobProgress",
            ConverterEvent::JobCompleted { .. } => "JobCompleted",
            ConverterEvent::JobFailed { .. } => "JobFailed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = ConverterEvent::JobProgress {
            job_id: Uuid::nil(),
            kind: JobKind::Export,
            percent: 60,
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "JobProgress");
        assert_eq!(json["kind"], "export");
        assert_eq!(json["percent"], 60);
    }

    #[test]
    fn test_event_type_matches_variant() {
        let event = ConverterEvent::CoverChanged {
            present: true,
            timestamp: chrono::Utc::now(),
        };
        assert_eq!(event.event_type(), "CoverChanged");
    }
}
