//! Core audio data types
//!
//! Defines the PCM buffer passed between decode, transform, encode, and
//! playback stages.

/// AudioBuffer holds decoded PCM audio for one conversion pass.
///
/// **Format:**
/// - Samples are f32 (floating point -1.0 to 1.0)
/// - Channel interleaved: [ch0, ch1, ch0, ch1, ...]
/// - Sample rate as declared by the source (not normalized)
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// PCM audio samples (channel interleaved)
    pub samples: Vec<f32>,

    /// Nominal sample rate in Hz
    pub sample_rate: u32,

    /// Channel count (1=mono, 2=stereo)
    pub channels: u16,

    /// Source bit depth, when the codec declares one
    pub bits_per_sample: Option<u32>,
}

impl AudioBuffer {
    /// Create a new buffer from interleaved samples
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
            bits_per_sample: None,
        }
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Duration in seconds at the nominal rate
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// True when the buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Keep only the first `seconds` of audio, frame aligned.
    ///
    /// A no-op when the buffer is already shorter.
    pub fn truncate_to_seconds(&mut self, seconds: f64) {
        let max_frames = (seconds * self.sample_rate as f64) as usize;
        let max_samples = max_frames * self.channels as usize;
        if self.samples.len() > max_samples {
            self.samples.truncate(max_samples);
        }
    }
}
