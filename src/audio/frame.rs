//! # Audio Frames
//!
//! An [`AudioFrame`] is one immutable unit of PCM16LE audio crossing the channel
//! boundary, together with the sample rate it should be played at. Inbound frames
//! come from the client; outbound frames are either echoes or greeting chunks
//! produced by [`chunk_pcm`].

use crate::audio::message::OutboundMessage;
use crate::audio::pcm::BYTES_PER_SAMPLE;
use std::time::Duration;

/// Immutable PCM16LE payload paired with its sample rate (Hz).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    sample_rate: u32,
    data: Vec<u8>,
}

impl AudioFrame {
    pub fn new(data: Vec<u8>, sample_rate: u32) -> Self {
        Self { sample_rate, data }
    }

    #[cfg(test)]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn to_message(&self) -> OutboundMessage {
        OutboundMessage::stream_audio(&self.data, self.sample_rate)
    }
}

/// Bytes per chunk for `chunk_duration` of audio at `sample_rate`.
///
/// The sample count is truncated toward zero and never
/// drops below one sample so chunking always makes progress.
pub fn chunk_size_bytes(sample_rate: u32, chunk_duration: Duration) -> usize {
    let samples = (sample_rate as f64 * chunk_duration.as_secs_f64()) as usize;
    samples.max(1) * BYTES_PER_SAMPLE
}

/// Split a PCM buffer into consecutive frames of `chunk_duration` each.
///
/// The split is lossless and exhaustive: concatenating the frames yields `pcm`
/// exactly. Only the final frame may be shorter than the nominal size.
pub fn chunk_pcm(
    pcm: &[u8],
    sample_rate: u32,
    chunk_duration: Duration,
) -> impl Iterator<Item = AudioFrame> + '_ {
    pcm.chunks(chunk_size_bytes(sample_rate, chunk_duration))
        .map(move |chunk| AudioFrame::new(chunk.to_vec(), sample_rate))
}
