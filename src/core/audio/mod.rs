//! Audio primitives shared by the capture and playback pipelines.
//!
//! # Modules
//! - `codec`: pure sample conversion, resampling and base64 helpers
//! - `capture`: microphone block encoding for the realtime wire
//! - `playback`: sequential playback queue with barge-in support
//! - `device`: host audio bindings through cpal (feature `device`)

pub mod capture;
pub mod codec;
#[cfg(feature = "device")]
pub mod device;
pub mod playback;

use std::time::Duration;

pub use capture::{CAPTURE_BLOCK_SIZE, CaptureSession, encode_capture_block};
pub use codec::{
    decode_base64, encode_base64, float_to_int16, float_to_pcm_bytes, generate_session_id,
    int16_to_float, int16_to_pcm_bytes, pcm_bytes_to_float, pcm_bytes_to_int16, resample_linear,
};
pub use playback::PlaybackQueue;

/// Sample rate of PCM16 audio on the realtime wire, in both directions.
pub const WIRE_SAMPLE_RATE: u32 = 24_000;

/// A block of mono float samples at a known sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Normalized samples in `[-1.0, 1.0]`
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Decode a little-endian PCM16 payload received from the wire.
    pub fn from_pcm16(bytes: &[u8], sample_rate: u32) -> Self {
        Self::new(pcm_bytes_to_float(bytes), sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback duration of the buffer.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Return a copy of this buffer converted to `target_rate`.
    pub fn resampled(&self, target_rate: u32) -> Self {
        Self::new(
            resample_linear(&self.samples, self.sample_rate, target_rate),
            target_rate,
        )
    }
}

/// Identifies one buffer handed to an audio sink.
///
/// Sinks report the ticket back once the buffer finished playing. Tickets are
/// never reused within a playback queue, so a completion that arrives after an
/// interruption can be recognised as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackTicket(pub u64);
