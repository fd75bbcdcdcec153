//! **PCM Codec** — quantization and wire encoding for audio frames
//!
//! Outbound: capture buffers of f32 samples become little-endian PCM16,
//! then base64 text inside a media frame. The scale factor is asymmetric
//! on purpose: negative samples scale by 32768 and non-negative by 32767,
//! so -1.0 and 1.0 land exactly on the i16 rails and the service decodes
//! the same waveform bit for bit.
//!
//! Inbound: translated audio arrives as base64 PCM16 and is decoded back
//! to i16 samples for playback.

use base64::{engine::general_purpose, Engine as _};

use crate::error::{LiveError, LiveResult};

/// Quantize normalized f32 samples to PCM16. Out-of-range input is clamped
/// to [-1.0, 1.0] before scaling.
pub fn quantize(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&sample| {
            let clamped = sample.clamp(-1.0, 1.0);
            if clamped < 0.0 {
                (clamped * 32768.0) as i16
            } else {
                (clamped * 32767.0) as i16
            }
        })
        .collect()
}

/// Serialize PCM16 samples as little-endian bytes.
pub fn to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Encode one capture buffer as a transport-ready base64 payload.
pub fn encode_frame(samples: &[f32]) -> String {
    general_purpose::STANDARD.encode(to_le_bytes(&quantize(samples)))
}

/// Decode a base64 PCM16 payload back to samples. A trailing odd byte is
/// dropped rather than treated as a sample.
pub fn decode_frame(base64_pcm: &str) -> LiveResult<Vec<i16>> {
    let bytes = general_purpose::STANDARD
        .decode(base64_pcm)
        .map_err(|e| LiveError::Playback(format!("undecodable PCM payload: {e}")))?;
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_hits_the_rails_exactly() {
        let samples = quantize(&[0.0, 1.0, -1.0]);
        assert_eq!(samples, vec![0, 32767, -32768]);
    }

    #[test]
    fn quantize_clamps_out_of_range_input() {
        let samples = quantize(&[2.5, -3.0]);
        assert_eq!(samples, vec![32767, -32768]);
    }

    #[test]
    fn quantize_scales_negative_and_positive_asymmetrically() {
        let samples = quantize(&[0.5, -0.5]);
        assert_eq!(samples, vec![16383, -16384]);
    }

    #[test]
    fn little_endian_byte_order() {
        let bytes = to_le_bytes(&[0, 32767, -32768]);
        assert_eq!(bytes, vec![0x00, 0x00, 0xFF, 0x7F, 0x00, 0x80]);
    }

    #[test]
    fn encode_frame_round_trips_through_base64() {
        let encoded = encode_frame(&[0.0, 0.25, -0.25, 1.0]);
        assert_eq!(
            decode_frame(&encoded).unwrap(),
            quantize(&[0.0, 0.25, -0.25, 1.0])
        );
        assert!(encode_frame(&[]).is_empty());
    }

    #[test]
    fn decode_rejects_invalid_base64() {
        assert!(decode_frame("not base64!!").is_err());
    }

    #[test]
    fn decode_drops_trailing_odd_byte() {
        // Three bytes: one full sample plus a dangling byte.
        let encoded = general_purpose::STANDARD.encode([0x01u8, 0x00, 0xFF]);
        assert_eq!(decode_frame(&encoded).unwrap(), vec![1i16]);
    }
}
