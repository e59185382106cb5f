//! MP3 encoder using LAME
//!
//! Encodes PCM buffers to MP3 at a fixed 192 kbps, matching the source
//! sample rate and channel layout. MP3 carries at most two channels.

use crate::audio::types::AudioBuffer;
use crate::error::{Error, Result};
use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, InterleavedPcm, MonoPcm, Quality};
use std::path::Path;
use tracing::debug;

/// Output bitrate for every encode
const OUTPUT_BITRATE: Bitrate = Bitrate::Kbps192;

/// MP3 encoder wrapping LAME.
pub struct Mp3Encoder;

impl Mp3Encoder {
    /// Encode a PCM buffer to MP3 bytes in memory.
    ///
    /// # Errors
    /// - More than two channels (MP3 is mono/stereo only)
    /// - LAME rejects the sample rate
    pub fn encode(buffer: &AudioBuffer) -> Result<Vec<u8>> {
        if buffer.channels == 0 || buffer.channels > 2 {
            return Err(Error::Encode(format!(
                "Unsupported channel count for MP3: {}",
                buffer.channels
            )));
        }

        let mut builder = Builder::new()
            .ok_or_else(|| Error::Encode("Failed to allocate LAME encoder".to_string()))?;
        builder
            .set_num_channels(buffer.channels as u8)
            .map_err(|e| Error::Encode(format!("Failed to set channel count: {:?}", e)))?;
        builder
            .set_sample_rate(buffer.sample_rate)
            .map_err(|e| Error::Encode(format!("Failed to set sample rate: {:?}", e)))?;
        builder
            .set_brate(OUTPUT_BITRATE)
            .map_err(|e| Error::Encode(format!("Failed to set bitrate: {:?}", e)))?;
        builder
            .set_quality(Quality::Best)
            .map_err(|e| Error::Encode(format!("Failed to set quality: {:?}", e)))?;

        let mut encoder = builder
            .build()
            .map_err(|e| Error::Encode(format!("Failed to initialize LAME encoder: {:?}", e)))?;

        let pcm = float_to_i16(&buffer.samples);

        let mut output = Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(
            buffer.frames(),
        ));

        match buffer.channels {
            1 => {
                encoder
                    .encode_to_vec(MonoPcm(&pcm), &mut output)
                    .map_err(|e| Error::Encode(format!("MP3 encode failed: {:?}", e)))?;
            }
            _ => {
                encoder
                    .encode_to_vec(InterleavedPcm(&pcm), &mut output)
                    .map_err(|e| Error::Encode(format!("MP3 encode failed: {:?}", e)))?;
            }
        }

        encoder
            .flush_to_vec::<FlushNoGap>(&mut output)
            .map_err(|e| Error::Encode(format!("MP3 flush failed: {:?}", e)))?;

        debug!(
            "Encoded {} frames to {} MP3 bytes",
            buffer.frames(),
            output.len()
        );

        Ok(output)
    }

    /// Encode a PCM buffer and write the MP3 to `path`.
    pub fn encode_to_file(buffer: &AudioBuffer, path: &Path) -> Result<()> {
        let bytes = Self::encode(buffer)?;
        std::fs::write(path, &bytes)?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }
}

/// Convert float samples to 16-bit integers with clipping
fn float_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&sample| {
            let clamped = sample.clamp(-1.0, 1.0);
            (clamped * 32767.0) as i16
        })
        .collect()
}
