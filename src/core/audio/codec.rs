//! Sample-format conversion, resampling and wire encoding helpers.
//!
//! Everything here is pure and allocation-bounded by the input size. The
//! realtime wire format is PCM 16-bit signed little-endian, mono, 24kHz,
//! carried as standard padded base64 inside JSON frames.

use base64::prelude::*;

/// Scale applied to negative samples when converting to int16.
const NEGATIVE_SCALE: f32 = 0x8000 as f32;

/// Scale applied to positive samples when converting to int16.
const POSITIVE_SCALE: f32 = 0x7fff as f32;

/// Scale factor for converting PCM 16-bit samples to normalized float (-1.0 to 1.0)
const PCM_TO_FLOAT_SCALE: f32 = 1.0 / 32768.0;

// =============================================================================
// Sample Conversion
// =============================================================================

/// Convert normalized float samples to signed 16-bit samples.
///
/// Input is clamped to `[-1.0, 1.0]` first. Negative values scale by `0x8000`
/// and positive values by `0x7fff` so both ends land exactly on the int16
/// boundaries without overflow.
pub fn float_to_int16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let s = if s.is_nan() { 0.0 } else { s.clamp(-1.0, 1.0) };
            if s < 0.0 {
                (s * NEGATIVE_SCALE) as i16
            } else {
                (s * POSITIVE_SCALE) as i16
            }
        })
        .collect()
}

/// Convert signed 16-bit samples to normalized floats.
pub fn int16_to_float(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&s| s as f32 * PCM_TO_FLOAT_SCALE)
        .collect()
}

/// Serialize int16 samples as little-endian bytes.
pub fn int16_to_pcm_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Parse little-endian PCM16 bytes into int16 samples.
///
/// A trailing odd byte is ignored.
pub fn pcm_bytes_to_int16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect()
}

/// Decode little-endian PCM16 bytes straight to normalized floats.
pub fn pcm_bytes_to_float(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 * PCM_TO_FLOAT_SCALE)
        .collect()
}

/// Encode normalized float samples as little-endian PCM16 bytes.
pub fn float_to_pcm_bytes(samples: &[f32]) -> Vec<u8> {
    int16_to_pcm_bytes(&float_to_int16(samples))
}

// =============================================================================
// Resampling
// =============================================================================

/// Resample mono audio with linear interpolation.
///
/// The output length is `round(len / (in_rate / out_rate))`. Each output
/// sample blends the two input samples around its fractional source position.
/// Matching rates return the input unchanged.
pub fn resample_linear(input: &[f32], in_rate: u32, out_rate: u32) -> Vec<f32> {
    if in_rate == out_rate || input.is_empty() || in_rate == 0 || out_rate == 0 {
        return input.to_vec();
    }

    let ratio = in_rate as f64 / out_rate as f64;
    let out_len = (input.len() as f64 / ratio).round() as usize;
    let last = input.len() - 1;

    let mut output = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let index = (pos.floor() as usize).min(last);
        let next = (index + 1).min(last);
        let frac = (pos - index as f64) as f32;
        output.push(input[index] * (1.0 - frac) + input[next] * frac);
    }
    output
}

// =============================================================================
// Text Encoding
// =============================================================================

/// Encode raw bytes as standard padded base64.
#[inline]
pub fn encode_base64(data: &[u8]) -> String {
    BASE64_STANDARD.encode(data)
}

/// Decode standard padded base64 into raw bytes.
#[inline]
pub fn decode_base64(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64_STANDARD.decode(data)
}

// =============================================================================
// Identifiers
// =============================================================================

/// Generate a random session identifier in canonical UUID v4 layout.
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
