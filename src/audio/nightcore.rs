//! Nightcore transform
//!
//! Speeds up and pitch-shifts audio by a fixed factor: the decoded stream
//! is relabeled at a higher nominal rate (same samples, so playback runs
//! faster and higher), then resampled back down to the source rate so the
//! output file plays everywhere the input did.

use crate::audio::resampler::Resampler;
use crate::audio::types::AudioBuffer;
use crate::error::Result;
use tracing::debug;

/// Fixed speed/pitch factor applied to every conversion
pub const SPEED_FACTOR: f64 = 1.25;

/// Nominal rate after the speed shift (integer truncation)
pub fn boosted_rate(sample_rate: u32) -> u32 {
    (sample_rate as f64 * SPEED_FACTOR) as u32
}

/// Apply the nightcore transform.
///
/// The output declares the same rate and channel count as the input and
/// is shorter by the speed factor. Empty input passes through unchanged.
pub fn apply(input: &AudioBuffer) -> Result<AudioBuffer> {
    if input.is_empty() {
        return Ok(input.clone());
    }

    let shifted_rate = boosted_rate(input.sample_rate);
    debug!(
        "Nightcore: {}Hz relabeled as {}Hz, resampling back",
        input.sample_rate, shifted_rate
    );

    // The relabel itself touches no sample data; the audible change comes
    // from converting the faster stream back to the original rate
    let samples = Resampler::resample(
        &input.samples,
        shifted_rate,
        input.sample_rate,
        input.channels,
    )?;

    let mut output = AudioBuffer::new(samples, input.sample_rate, input.channels);
    output.bits_per_sample = input.bits_per_sample;
    Ok(output)
}
