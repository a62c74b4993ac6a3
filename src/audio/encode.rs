//! PCM16 wire encoding for outbound microphone blocks and inbound speech.
//!
//! Outbound: f32 samples in [-1, 1] are scaled by 32768 and truncated toward
//! zero (saturating at the i16 bounds), packed little-endian, and base64
//! encoded. Inbound: base64 PCM16 little-endian is decoded back to f32.

use crate::defaults;
use crate::error::{CognitaError, Result};
use base64::prelude::*;

/// One encoded block of microphone audio, ready for the outbound sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Base64 of little-endian PCM16 samples.
    pub data: String,
    /// Format label, e.g. `audio/pcm;rate=16000`.
    pub mime_type: String,
    /// Number of samples in the block.
    pub samples: usize,
    /// Capture order of this block within the session.
    pub sequence: u64,
}

impl AudioChunk {
    /// Decoded payload size in bytes.
    pub fn byte_len(&self) -> usize {
        self.samples * 2
    }
}

/// Quantize float samples to i16: `value * 32768`, truncated.
///
/// `as` casts from f32 saturate, so `1.0` maps to `i16::MAX` and anything
/// below `-1.0` maps to `i16::MIN`. NaN maps to 0.
pub fn quantize(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s * defaults::PCM16_SCALE) as i16)
        .collect()
}

/// Pack i16 samples as little-endian bytes.
pub fn pcm16_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}

/// Quantize and encode a captured block.
pub fn encode_block(samples: &[f32], sequence: u64) -> AudioChunk {
    let pcm = quantize(samples);
    AudioChunk {
        data: BASE64_STANDARD.encode(pcm16_to_bytes(&pcm)),
        mime_type: defaults::INPUT_MIME_TYPE.to_string(),
        samples: pcm.len(),
        sequence,
    }
}

/// Decode a base64 PCM16 little-endian payload to i16 samples.
pub fn decode_pcm16(data: &str) -> Result<Vec<i16>> {
    let bytes = BASE64_STANDARD
        .decode(data)
        .map_err(|e| CognitaError::AudioDecode {
            message: format!("invalid base64: {}", e),
        })?;

    if bytes.is_empty() {
        return Err(CognitaError::AudioDecode {
            message: "empty payload".to_string(),
        });
    }
    if bytes.len() % 2 != 0 {
        return Err(CognitaError::AudioDecode {
            message: format!("odd byte count {} for 16-bit PCM", bytes.len()),
        });
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Decode a base64 PCM16 payload into playable f32 samples.
pub fn decode_to_f32(data: &str) -> Result<Vec<f32>> {
    Ok(decode_pcm16(data)?
        .into_iter()
        .map(|s| s as f32 / defaults::PCM16_SCALE)
        .collect())
}

/// Extract the sample rate from a MIME label such as `audio/pcm;rate=24000`.
pub fn rate_from_mime(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("rate"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .filter(|&rate| rate > 0)
}
