//! # Greeting Clip
//!
//! The greeting is decoded once at startup and then shared read-only by every
//! session through an `Arc<GreetingClip>`.
//!
//! ## Format normalisation:
//! - 16-bit PCM is used as-is
//! - 32-bit float is clamped to [-1.0, 1.0] and scaled by `i16::MAX`
//! - 8-bit and 24-bit integer audio is clamped into the 16-bit range
//! - multi-channel audio is flattened: the interleaved samples are played as one
//!   mono stream
//!
//! A missing or unreadable greeting is never fatal; the service just runs without it.

use crate::audio::frame::{self, AudioFrame};
use crate::audio::pcm;
use crate::error::AudioError;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug)]
pub struct GreetingClip {
    sample_rate: u32,
    pcm: Arc<[u8]>,
}

impl GreetingClip {
    pub fn new(sample_rate: u32, pcm: Vec<u8>) -> Self {
        Self {
            sample_rate,
            pcm: pcm.into(),
        }
    }

    pub fn from_samples(sample_rate: u32, samples: &[i16]) -> Self {
        Self::new(sample_rate, pcm::samples_to_bytes(samples))
    }

    /// Decode a WAV file into a greeting clip.
    pub fn load(path: &Path) -> Result<Self, AudioError> {
        let mut file = File::open(path)?;
        let (header, data) = wav::read(&mut file)?;

        if header.sampling_rate == 0 {
            return Err(AudioError::UnsupportedFormat(format!(
                "{} declares a sample rate of 0",
                path.display()
            )));
        }

        let samples = match data {
            wav::BitDepth::Sixteen(samples) => samples,
            wav::BitDepth::ThirtyTwoFloat(samples) => pcm::float_to_i16(&samples),
            wav::BitDepth::TwentyFour(samples) => pcm::clamp_to_i16(&samples),
            wav::BitDepth::Eight(samples) => pcm::widen_u8(&samples),
            wav::BitDepth::Empty => {
                return Err(AudioError::UnsupportedFormat(format!(
                    "{} has no decodable sample data (format {}, {} bits)",
                    path.display(),
                    header.audio_format,
                    header.bits_per_sample
                )))
            }
        };

        if samples.is_empty() {
            return Err(AudioError::EmptyClip(path.to_path_buf()));
        }

        if header.channel_count > 1 {
            warn!(
                channels = header.channel_count,
                "greeting has multiple channels; interleaved samples are played as mono"
            );
        }

        Ok(Self::from_samples(header.sampling_rate, &samples))
    }

    /// Load the configured greeting, logging and swallowing any failure.
    pub fn load_optional(path: Option<&Path>) -> Option<Arc<GreetingClip>> {
        let path = path?;
        match GreetingClip::load(path) {
            Ok(clip) => {
                info!(
                    path = %path.display(),
                    sample_rate = clip.sample_rate(),
                    bytes = clip.byte_len(),
                    "loaded greeting clip (~{:.2}s)",
                    clip.duration().as_secs_f64()
                );
                Some(Arc::new(clip))
            }
            Err(err) => {
                warn!("failed to load greeting wav: {} ({})", path.display(), err);
                None
            }
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[cfg(test)]
    pub fn pcm(&self) -> &[u8] {
        &self.pcm
    }

    pub fn byte_len(&self) -> usize {
        self.pcm.len()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(pcm::sample_count(self.pcm.len()) as f64 / self.sample_rate as f64)
    }

    /// Outbound frames of `chunk_duration` each, in playback order.
    pub fn chunks(&self, chunk_duration: Duration) -> impl Iterator<Item = AudioFrame> + '_ {
        frame::chunk_pcm(&self.pcm, self.sample_rate, chunk_duration)
    }
}
