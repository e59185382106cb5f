//! Audio pipeline stages
//!
//! Decode (symphonia), transform (rate relabel + rubato resample), encode
//! (LAME), and playback (cpal), all operating on interleaved f32 buffers.

pub mod decoder;
pub mod encoder;
pub mod nightcore;
pub mod player;
pub mod resampler;
pub mod types;

pub use types::AudioBuffer;
