//! # Session Recordings
//!
//! Persists the audio received during a session as a single mono PCM16LE WAV file.
//!
//! ## File naming:
//! `<identity>_<YYYYmmdd_HHMMSS>.wav`, where the identity is the connection path with
//! every character other than a letter, digit, `-` or `_` replaced by `_`. Files are created with
//! create-new semantics; if the name is taken, `_1`, `_2`, ... is appended so an
//! existing recording is never overwritten.

use crate::error::AudioError;
use chrono::{DateTime, Local};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

const EXTENSION: &str = "wav";
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Whether `identity` is non-empty and already uses only letters, digits, `-` and `_`.
pub fn is_identifier_safe(identity: &str) -> bool {
    !identity.is_empty() && identity.chars().all(is_safe_char)
}

fn is_safe_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

/// Map every disallowed character to a single `_`; empty identities use `fallback`.
pub fn sanitize_identity(identity: &str, fallback: &str) -> String {
    let identity = if identity.is_empty() { fallback } else { identity };
    identity
        .chars()
        .map(|c| if is_safe_char(c) { c } else { '_' })
        .collect()
}

/// File name for a recording, without the collision suffix.
pub fn recording_file_name(identity: &str, fallback: &str, timestamp: DateTime<Local>) -> String {
    format!(
        "{}_{}.{}",
        sanitize_identity(identity, fallback),
        timestamp.format("%Y%m%d_%H%M%S"),
        EXTENSION
    )
}

/// Writes finished sessions into the configured output directory.
#[derive(Debug, Clone)]
pub struct RecordingWriter {
    output_dir: PathBuf,
    sample_rate: u32,
    fallback_identity: String,
}

/// Where a recording ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedRecording {
    pub path: PathBuf,
    pub samples: usize,
    pub duration_seconds: f64,
}

impl RecordingWriter {
    /// Create the writer, creating `output_dir` if it does not exist yet.
    pub fn new(
        output_dir: impl Into<PathBuf>,
        sample_rate: u32,
        fallback_identity: impl Into<String>,
    ) -> Result<Self, AudioError> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(Self {
            output_dir,
            sample_rate,
            fallback_identity: fallback_identity.into(),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Write `samples` as a mono 16-bit WAV named after `identity` and the current time.
    pub fn write(&self, identity: &str, samples: Vec<i16>) -> Result<SavedRecording, AudioError> {
        let name = recording_file_name(identity, &self.fallback_identity, Local::now());
        let (path, file) = self.create_unique(&name)?;
        self.write_or_discard(path, file, samples)
    }

    /// Encode into `out`, removing the half-written file at `path` on failure.
    fn write_or_discard<W: Write + Seek>(
        &self,
        path: PathBuf,
        mut out: W,
        samples: Vec<i16>,
    ) -> Result<SavedRecording, AudioError> {
        let sample_count = samples.len();
        let header = wav::Header::new(wav::header::WAV_FORMAT_PCM, 1, self.sample_rate, 16);
        if let Err(source) = wav::write(header, &wav::BitDepth::Sixteen(samples), &mut out) {
            drop(out);
            if let Err(err) = fs::remove_file(&path) {
                warn!("failed to remove partial recording {}: {}", path.display(), err);
            }
            return Err(AudioError::Write { path, source });
        }

        Ok(SavedRecording {
            path,
            samples: sample_count,
            duration_seconds: sample_count as f64 / self.sample_rate as f64,
        })
    }

    fn create_unique(&self, name: &str) -> Result<(PathBuf, File), AudioError> {
        let stem = name.trim_end_matches(&format!(".{}", EXTENSION));
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = if attempt == 0 {
                self.output_dir.join(name)
            } else {
                self.output_dir.join(format!("{}_{}.{}", stem, attempt, EXTENSION))
            };

            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(file) => return Ok((candidate, file)),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Err(AudioError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free file name for {} after {} attempts", name, MAX_NAME_ATTEMPTS),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_identity() {
        assert_eq!(sanitize_identity("a/b c", "session"), "a_b_c");
        assert_eq!(sanitize_identity("call-42_x", "session"), "call-42_x");
        assert_eq!(sanitize_identity("", "session"), "session");
        assert_eq!(sanitize_identity("ü.wav", "session"), "ü_wav");
        assert_eq!(sanitize_identity("café-1", "session"), "café-1");
        assert_eq!(sanitize_identity("日本 語", "session"), "日本_語");
    }

    #[test]
    fn test_recording_file_name() {
        let ts = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(recording_file_name("a/b c", "session", ts), "a_b_c_20240309_070501.wav");
        assert_eq!(recording_file_name("", "session", ts), "session_20240309_070501.wav");
    }

    #[test]
    fn test_identifier_safety() {
        assert!(is_identifier_safe("session"));
        assert!(!is_identifier_safe(""));
        assert!(!is_identifier_safe("a b"));
        assert!(is_identifier_safe("café"));
    }

    #[test]
    fn test_write_creates_wav_and_directory() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("nested").join("recordings");
        let writer = RecordingWriter::new(&out, 16000, "session").unwrap();
        assert!(out.is_dir());

        let saved = writer.write("caller/1", vec![1, 2, 3, 4]).unwrap();
        assert_eq!(saved.samples, 4);
        assert!(saved.path.starts_with(&out));
        let name = saved.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("caller_1_"));
        assert!(name.ends_with(".wav"));

        let mut file = File::open(&saved.path).unwrap();
        let (header, data) = wav::read(&mut file).unwrap();
        assert_eq!(header.channel_count, 1);
        assert_eq!(header.sampling_rate, 16000);
        assert_eq!(header.bits_per_sample, 16);
        match data {
            wav::BitDepth::Sixteen(samples) => assert_eq!(samples, vec![1, 2, 3, 4]),
            _ => panic!("recording is not 16-bit"),
        }
    }

    #[test]
    fn test_existing_file_is_never_overwritten() {
        let dir = tempdir().unwrap();
        let writer = RecordingWriter::new(dir.path(), 16000, "session").unwrap();

        let first = writer.write("same", vec![1]).unwrap();
        let second = writer.write("same", vec![2]).unwrap();
        let third = writer.write("same", vec![3]).unwrap();

        // Within the same second the later writes get numeric suffixes.
        assert_ne!(first.path, second.path);
        assert_ne!(second.path, third.path);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for FullDisk {
        fn seek(&mut self, _pos: io::SeekFrom) -> io::Result<u64> {
            Ok(0)
        }
    }

    #[test]
    fn test_failed_write_leaves_no_partial_file() {
        let dir = tempdir().unwrap();
        let writer = RecordingWriter::new(dir.path(), 16000, "session").unwrap();
        let path = dir.path().join("caller_20240309_070501.wav");
        File::create(&path).unwrap();

        let err = writer.write_or_discard(path.clone(), FullDisk, vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, AudioError::Write { .. }));
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
