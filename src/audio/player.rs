//! Audio playback using cpal
//!
//! Plays a complete PCM buffer synchronously on the default output device.
//! Used by the preview path; the call returns once the buffer has played
//! through (or the stream reports an error).

use crate::audio::resampler::Resampler;
use crate::audio::types::AudioBuffer;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Shared between the caller and the audio callback.
///
/// Samples are already in the device's rate and channel layout; the
/// callback reads past the end as silence and raises `finished`.
struct PlaybackSource {
    samples: Vec<f32>,
    position: AtomicUsize,
    finished: AtomicBool,
}

/// Synchronous playback on the default output device.
pub struct Player;

impl Player {
    /// Play the buffer to completion, blocking the calling thread.
    ///
    /// The buffer is resampled to the device rate and remapped to the
    /// device channel layout before the stream starts. An empty buffer
    /// returns immediately.
    pub fn play_buffer(buffer: &AudioBuffer) -> Result<()> {
        if buffer.is_empty() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Playing on audio device: {}", name);

        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.config();

        let device_rate = config.sample_rate.0;
        let device_channels = config.channels;

        debug!(
            "Device config: sample_rate={}, channels={}, format={:?}",
            device_rate, device_channels, sample_format
        );

        let samples = if buffer.sample_rate != device_rate {
            Resampler::resample(
                &buffer.samples,
                buffer.sample_rate,
                device_rate,
                buffer.channels,
            )?
        } else {
            buffer.samples.clone()
        };
        let samples = map_channels(&samples, buffer.channels, device_channels);

        let frames = samples.len() / device_channels.max(1) as usize;
        let play_seconds = frames as f64 / device_rate as f64;

        let source = Arc::new(PlaybackSource {
            samples,
            position: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
        });

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream_f32(&device, &config, Arc::clone(&source))?,
            SampleFormat::I16 => Self::build_stream_i16(&device, &config, Arc::clone(&source))?,
            SampleFormat::U16 => Self::build_stream_u16(&device, &config, Arc::clone(&source))?,
            other => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        // Block until the source drains. The deadline covers a stalled
        // device, since there is no cancel path.
        let deadline = Instant::now() + Duration::from_secs_f64(play_seconds + 2.0);
        while !source.finished.load(Ordering::Relaxed) {
            if Instant::now() >= deadline {
                warn!("Playback did not finish before deadline, stopping");
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        // Let the device drain its final buffer
        std::thread::sleep(Duration::from_millis(100));

        drop(stream);
        debug!("Playback finished");
        Ok(())
    }

    /// Build audio stream for f32 samples
    fn build_stream_f32(
        device: &Device,
        config: &StreamConfig,
        source: Arc<PlaybackSource>,
    ) -> Result<Stream> {
        let err_source = Arc::clone(&source);

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let start = source.position.fetch_add(data.len(), Ordering::Relaxed);
                    for (i, slot) in data.iter_mut().enumerate() {
                        let sample = source.samples.get(start + i).copied().unwrap_or(0.0);
                        *slot = sample.clamp(-1.0, 1.0);
                    }
                    if start.saturating_add(data.len()) >= source.samples.len() {
                        source.finished.store(true, Ordering::Relaxed);
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    err_source.finished.store(true, Ordering::Relaxed);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?;

        Ok(stream)
    }

    /// Build audio stream for i16 samples
    fn build_stream_i16(
        device: &Device,
        config: &StreamConfig,
        source: Arc<PlaybackSource>,
    ) -> Result<Stream> {
        let err_source = Arc::clone(&source);

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    let start = source.position.fetch_add(data.len(), Ordering::Relaxed);
                    for (i, slot) in data.iter_mut().enumerate() {
                        let sample = source.samples.get(start + i).copied().unwrap_or(0.0);
                        let clamped = sample.clamp(-1.0, 1.0);
                        *slot = (clamped * i16::MAX as f32) as i16;
                    }
                    if start.saturating_add(data.len()) >= source.samples.len() {
                        source.finished.store(true, Ordering::Relaxed);
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    err_source.finished.store(true, Ordering::Relaxed);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?;

        Ok(stream)
    }

    /// Build audio stream for u16 samples
    fn build_stream_u16(
        device: &Device,
        config: &StreamConfig,
        source: Arc<PlaybackSource>,
    ) -> Result<Stream> {
        let err_source = Arc::clone(&source);

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                    let start = source.position.fetch_add(data.len(), Ordering::Relaxed);
                    for (i, slot) in data.iter_mut().enumerate() {
                        let sample = source.samples.get(start + i).copied().unwrap_or(0.0);
                        let clamped = sample.clamp(-1.0, 1.0);
                        // Convert from [-1.0, 1.0] to [0, 65535]
                        *slot = ((clamped + 1.0) * 32767.5) as u16;
                    }
                    if start.saturating_add(data.len()) >= source.samples.len() {
                        source.finished.store(true, Ordering::Relaxed);
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    err_source.finished.store(true, Ordering::Relaxed);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?;

        Ok(stream)
    }
}

/// Remap interleaved samples from the source channel layout to the device
/// layout.
///
/// Mono sources are duplicated across all device channels; extra device
/// channels beyond a stereo pair receive the front pair average; a mono
/// device receives the front pair average.
fn map_channels(samples: &[f32], src_channels: u16, device_channels: u16) -> Vec<f32> {
    if src_channels == device_channels || src_channels == 0 {
        return samples.to_vec();
    }

    let src = src_channels as usize;
    let dev = device_channels as usize;
    let frames = samples.len() / src;
    let mut out = Vec::with_capacity(frames * dev);

    for frame_idx in 0..frames {
        let frame = &samples[frame_idx * src..(frame_idx + 1) * src];
        let front_avg = if src >= 2 {
            (frame[0] + frame[1]) * 0.5
        } else {
            frame[0]
        };

        for ch in 0..dev {
            let sample = if src == 1 {
                frame[0]
            } else if dev == 1 {
                front_avg
            } else if ch < src {
                frame[ch]
            } else {
                front_avg
            };
            out.push(sample);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_channels_passthrough() {
        let samples = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(map_channels(&samples, 2, 2), samples);
    }

    #[test]
    fn test_map_channels_mono_to_stereo() {
        let samples = vec![0.1, 0.2];
        assert_eq!(map_channels(&samples, 1, 2), vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn test_map_channels_stereo_to_mono() {
        let samples = vec![0.2, 0.4, -0.2, -0.4];
        let mapped = map_channels(&samples, 2, 1);
        assert!((mapped[0] - 0.3).abs() < 1e-6);
        assert!((mapped[1] + 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_map_channels_stereo_to_quad() {
        let samples = vec![0.2, 0.4];
        let mapped = map_channels(&samples, 2, 4);
        assert_eq!(mapped.len(), 4);
        assert!((mapped[0] - 0.2).abs() < 1e-6);
        assert!((mapped[1] - 0.4).abs() < 1e-6);
        // Extra channels carry the front pair average
        assert!((mapped[2] - 0.3).abs() < 1e-6);
        assert!((mapped[3] - 0.3).abs() < 1e-6);
    }

    // Device playback itself needs audio hardware and is exercised
    // manually.
}
