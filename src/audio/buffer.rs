//! # Session Buffer
//!
//! Append-only accumulation of the audio received during one echo session. Each
//! inbound frame is decoded into its own sample block; blocks are kept in arrival
//! order and only concatenated once, when the session is finalized.
//!
//! ## Ownership:
//! A buffer belongs to exactly one session controller and is never shared, so unlike
//! a streaming ring buffer it needs no locking.

use crate::audio::pcm;

#[derive(Debug, Default)]
pub struct SessionBuffer {
    blocks: Vec<Vec<i16>>,
    total_samples: usize,
}

impl SessionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a copy of the samples in `data` (PCM16LE).
    ///
    /// Returns the number of samples appended. Frames without a whole sample add
    /// nothing.
    pub fn append_pcm(&mut self, data: &[u8]) -> usize {
        let samples = pcm::bytes_to_samples(data);
        let appended = samples.len();
        if appended > 0 {
            self.total_samples += appended;
            self.blocks.push(samples);
        }
        appended
    }

    pub fn is_empty(&self) -> bool {
        self.total_samples == 0
    }

    #[cfg(test)]
    pub fn total_samples(&self) -> usize {
        self.total_samples
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Duration in seconds at `sample_rate`.
    pub fn duration_seconds(&self, sample_rate: u32) -> f64 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.total_samples as f64 / sample_rate as f64
    }

    /// Concatenate every block in arrival order, leaving the buffer empty.
    pub fn take_samples(&mut self) -> Vec<i16> {
        let mut samples = Vec::with_capacity(self.total_samples);
        for block in self.blocks.drain(..) {
            samples.extend_from_slice(&block);
        }
        self.total_samples = 0;
        samples
    }
}
