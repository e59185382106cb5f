//! Audio decoder using symphonia
//!
//! Decodes MP3 files to interleaved f32 PCM, and probes stream parameters
//! without a full decode for song load.

use crate::audio::types::AudioBuffer;
use crate::error::{Error, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Stream parameters read from the container/codec headers
#[derive(Debug, Clone)]
pub struct ProbedAudio {
    /// Declared sample rate in Hz
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
    /// Duration in seconds, when the container declares a frame count
    pub duration_seconds: Option<f64>,
}

/// MP3 decoder built on symphonia.
///
/// Decodes the whole file into RAM; conversions operate on complete
/// buffers rather than streams.
pub struct SongDecoder;

impl SongDecoder {
    /// Probe stream parameters without decoding audio data.
    ///
    /// Used at song load to populate the display and validate the file
    /// is a decodable MP3.
    pub fn probe_file(path: &Path) -> Result<ProbedAudio> {
        let (_, _, codec_params) = Self::open_format(path)?;

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;

        let channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| Error::Decode("Channel count not found".to_string()))?;

        let duration_seconds = codec_params
            .n_frames
            .map(|frames| frames as f64 / sample_rate as f64);

        Ok(ProbedAudio {
            sample_rate,
            channels,
            duration_seconds,
        })
    }

    /// Decode entire audio file to PCM samples.
    ///
    /// # Returns
    /// AudioBuffer with interleaved f32 samples at the source rate and
    /// channel count.
    ///
    /// # Errors
    /// - Failed to open file
    /// - Unsupported audio format
    /// - No decodable packets
    pub fn decode_file(path: &Path) -> Result<AudioBuffer> {
        debug!("Decoding entire file: {}", path.display());

        let (mut format, track_id, codec_params) = Self::open_format(path)?;

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;

        let channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| Error::Decode("Channel count not found".to_string()))?;

        debug!(
            "Audio format: sample_rate={}, channels={}",
            sample_rate, channels
        );

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        // Decode all packets
        let mut samples = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    // End of stream
                    debug!("Reached end of file");
                    break;
                }
                Err(e) => {
                    warn!("Error reading packet: {}", e);
                    break;
                }
            };

            // Skip packets for other tracks
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    // Allocate the conversion buffer once, at the decoder's
                    // maximum packet capacity
                    if sample_buf.is_none() {
                        let spec = *decoded.spec();
                        let capacity = decoded.capacity() as u64;
                        sample_buf = Some(SampleBuffer::new(capacity, spec));
                    }
                    if let Some(buf) = sample_buf.as_mut() {
                        buf.copy_interleaved_ref(decoded);
                        samples.extend_from_slice(buf.samples());
                    }
                }
                Err(e) => {
                    warn!("Decode error: {}", e);
                    continue;
                }
            }
        }

        if samples.is_empty() {
            return Err(Error::Decode(format!(
                "No decodable audio in {}",
                path.display()
            )));
        }

        debug!(
            "Decoded {} samples ({} frames)",
            samples.len(),
            samples.len() / channels as usize
        );

        let mut buffer = AudioBuffer::new(samples, sample_rate, channels);
        buffer.bits_per_sample = codec_params.bits_per_sample;
        Ok(buffer)
    }

    /// Open a file and locate its first decodable audio track.
    fn open_format(path: &Path) -> Result<(Box<dyn FormatReader>, u32, CodecParameters)> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Decode(format!("Failed to open file {}: {}", path.display(), e)))?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Hint the format registry with the file extension
        let mut hint = Hint::new();
        if let Some(extension) = path.extension() {
            if let Some(ext_str) = extension.to_str() {
                hint.with_extension(ext_str);
            }
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        Ok((format, track_id, codec_params))
    }
}
