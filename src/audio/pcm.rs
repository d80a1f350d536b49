//! # PCM16LE Sample Conversion
//!
//! Helpers converting between the raw little-endian byte form that travels over the
//! WebSocket and `i16` sample sequences, plus the normalisation applied to greeting
//! clips stored in other sample formats.

use byteorder::{ByteOrder, LittleEndian};

/// Bytes occupied by one PCM16 sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Decode little-endian 16-bit samples.
///
/// A trailing odd byte cannot form a sample and is ignored.
pub fn bytes_to_samples(data: &[u8]) -> Vec<i16> {
    let whole = data.len() - data.len() % BYTES_PER_SAMPLE;
    let mut samples = vec![0i16; whole / BYTES_PER_SAMPLE];
    LittleEndian::read_i16_into(&data[..whole], &mut samples);
    samples
}

/// Encode samples as little-endian bytes.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut data = vec![0u8; samples.len() * BYTES_PER_SAMPLE];
    LittleEndian::write_i16_into(samples, &mut data);
    data
}

/// Convert floating point samples to 16-bit.
///
/// Values are clamped to [-1.0, 1.0] and scaled by `i16::MAX`; the cast truncates
/// toward zero.
pub fn float_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&sample| (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

/// Convert wider integer samples to 16-bit by clamping to the `i16` range.
///
/// The value itself is not rescaled, so 24-bit audio that exceeds the 16-bit range
/// saturates.
pub fn clamp_to_i16(samples: &[i32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&sample| sample.clamp(i16::MIN as i32, i16::MAX as i32) as i16)
        .collect()
}

/// Convert unsigned 8-bit samples to 16-bit. Values already fit, so they are carried over as-is.
pub fn widen_u8(samples: &[u8]) -> Vec<i16> {
    samples.iter().map(|&sample| sample as i16).collect()
}

/// Number of whole samples contained in `byte_len` bytes.
pub fn sample_count(byte_len: usize) -> usize {
    byte_len / BYTES_PER_SAMPLE
}
