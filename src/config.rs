//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `HOST` / `PORT` environment variables (deployment platforms)
//! 2. Environment variables (APP_SERVER__HOST, APP_AUDIO__GREETING_PATH, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)
//!
//! ## Nested keys:
//! Environment variables use a double underscore between sections because many
//! field names already contain a single underscore (`greeting_path`, `output_dir`).

use crate::audio::recording::is_identifier_safe;
use crate::audio::session::SessionSettings;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// Breaking configuration into logical groups (server, audio, recording)
/// keeps each group small and mirrors the sections of `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    pub recording: RecordingConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Audio streaming configuration.
///
/// ## Fields:
/// - `session_sample_rate`: Canonical rate of every inbound frame, echoed frame and recording
/// - `greeting_path`: WAV clip played to the far end before echoing starts (optional)
/// - `chunk_duration_ms`: Duration of one outbound greeting chunk
/// - `pacing_factor`: Fraction of the chunk duration slept after each greeting chunk
/// - `drain_window_ms`: Wall-clock budget for discarding queued audio after the greeting
/// - `drain_idle_timeout_ms`: Per-receive timeout while draining; the first idle gap ends the drain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub session_sample_rate: u32,
    #[serde(default)]
    pub greeting_path: Option<String>,
    pub chunk_duration_ms: u64,
    pub pacing_factor: f64,
    pub drain_window_ms: u64,
    pub drain_idle_timeout_ms: u64,
}

/// Where and how session recordings are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Directory receiving one WAV file per session (created on startup)
    pub output_dir: String,
    /// Filename stem used when the session identity is empty
    pub fallback_identity: String,
}

/// Provides default configuration values.
///
/// ## Why defaults matter:
/// Default values ensure the application can start even if no configuration file exists.
/// They also serve as documentation of reasonable starting values.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            audio: AudioConfig {
                session_sample_rate: 16000,   // 16kHz mono PCM16LE from the client
                greeting_path: Some("ivr-echo_your_audio_back-16k.wav".to_string()),
                chunk_duration_ms: 100,       // 100ms of audio per greeting message
                pacing_factor: 0.9,           // sleep 90ms per 100ms chunk
                drain_window_ms: 500,
                drain_idle_timeout_ms: 50,
            },
            recording: RecordingConfig {
                output_dir: "./recordings".to_string(),
                fallback_identity: "session".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_AUDIO__GREETING_PATH=/srv/greeting.wav`: Use another greeting clip
    /// - `APP_RECORDING__OUTPUT_DIR=/var/lib/echo`: Store recordings elsewhere
    /// - `HOST=0.0.0.0` / `PORT=3000`: Special cases for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## Why validate:
    /// A zero chunk duration would make greeting playback loop forever and a zero
    /// sample rate would make every duration computation divide by zero, so these
    /// are rejected before the server starts.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.audio.session_sample_rate == 0 {
            return Err(anyhow::anyhow!("Session sample rate must be greater than 0"));
        }

        if self.audio.chunk_duration_ms == 0 {
            return Err(anyhow::anyhow!("Greeting chunk duration must be greater than 0"));
        }

        if !(self.audio.pacing_factor > 0.0 && self.audio.pacing_factor <= 1.0) {
            return Err(anyhow::anyhow!(
                "Pacing factor must be in (0, 1], got {}",
                self.audio.pacing_factor
            ));
        }

        if self.audio.drain_idle_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Drain idle timeout must be greater than 0"));
        }

        if self.recording.output_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("Recording output directory cannot be empty"));
        }

        if !is_identifier_safe(&self.recording.fallback_identity) {
            return Err(anyhow::anyhow!(
                "Fallback identity '{}' must be non-empty and contain only alphanumerics, '-' or '_'",
                self.recording.fallback_identity
            ));
        }

        Ok(())
    }

    /// Greeting clip location, if one is configured.
    ///
    /// An empty string counts as "no greeting" so the greeting can be disabled
    /// from the environment with `APP_AUDIO__GREETING_PATH=`.
    pub fn greeting_path(&self) -> Option<PathBuf> {
        self.audio
            .greeting_path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
    }

    /// Timing and rate parameters handed to every session controller.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            session_sample_rate: self.audio.session_sample_rate,
            chunk_duration: Duration::from_millis(self.audio.chunk_duration_ms),
            pacing_factor: self.audio.pacing_factor,
            drain_window: Duration::from_millis(self.audio.drain_window_ms),
            drain_idle_timeout: Duration::from_millis(self.audio.drain_idle_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that the default configuration is valid and has expected values.
    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.audio.session_sample_rate, 16000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.audio.chunk_duration_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.audio.pacing_factor = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.recording.fallback_identity = "bad name".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_settings_mapping() {
        let settings = AppConfig::default().session_settings();
        assert_eq!(settings.session_sample_rate, 16000);
        assert_eq!(settings.chunk_duration, Duration::from_millis(100));
        assert_eq!(settings.pacing_delay(), Duration::from_millis(90));
        assert_eq!(settings.drain_window, Duration::from_millis(500));
        assert_eq!(settings.drain_idle_timeout, Duration::from_millis(50));
    }

    #[test]
    fn test_blank_greeting_path_disables_greeting() {
        let mut config = AppConfig::default();
        config.audio.greeting_path = Some("  ".to_string());
        assert!(config.greeting_path().is_none());

        config.audio.greeting_path = None;
        assert!(config.greeting_path().is_none());

        config.audio.greeting_path = Some("hello.wav".to_string());
        assert_eq!(config.greeting_path(), Some(PathBuf::from("hello.wav")));
    }
}
