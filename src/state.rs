//! # Application State Management
//!
//! Shared, read-mostly state handed to every HTTP handler and WebSocket session.
//!
//! ## Sharing model:
//! - **Configuration**: loaded once at startup, shared immutably behind an `Arc`
//! - **Greeting clip**: decoded once, shared read-only by every session
//! - **Recording writer**: cheap to clone; each session gets its own copy
//! - **Metrics**: lock-free atomic counters, the only state sessions write to
//!
//! Sessions never share buffers or controllers; everything per-connection lives in
//! the session task.

use crate::audio::greeting::GreetingClip;
use crate::audio::recording::RecordingWriter;
use crate::audio::session::{FinalizeOutcome, SessionController, SessionEnd, SessionReport};
use crate::config::AppConfig;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,

    /// `None` when no greeting is configured or it failed to load
    pub greeting: Option<Arc<GreetingClip>>,

    pub recorder: RecordingWriter,

    pub metrics: Arc<SessionMetrics>,

    /// When the server started
    pub start_time: Instant,
}

/// Process-wide session counters.
#[derive(Debug, Default)]
pub struct SessionMetrics {
    active_sessions: AtomicU64,
    total_sessions: AtomicU64,
    recordings_saved: AtomicU64,
    empty_sessions: AtomicU64,
    write_failures: AtomicU64,
    transport_errors: AtomicU64,
}

/// Point-in-time copy of [`SessionMetrics`], for health output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub active_sessions: u64,
    pub total_sessions: u64,
    pub recordings_saved: u64,
    pub empty_sessions: u64,
    pub write_failures: u64,
    pub transport_errors: u64,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        greeting: Option<Arc<GreetingClip>>,
        recorder: RecordingWriter,
    ) -> Self {
        Self {
            config: Arc::new(config),
            greeting,
            recorder,
            metrics: Arc::new(SessionMetrics::default()),
            start_time: Instant::now(),
        }
    }

    /// Build the controller for a newly accepted connection.
    pub fn new_session(&self, identity: &str) -> SessionController {
        SessionController::new(
            identity,
            self.greeting.clone(),
            self.config.session_settings(),
            self.recorder.clone(),
        )
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl SessionMetrics {
    pub fn session_started(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
        self.total_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Account for a finished session. Every `session_started` must be paired with
    /// exactly one call to this or [`SessionMetrics::session_aborted`].
    pub fn record_report(&self, report: &SessionReport) {
        self.session_ended();

        if matches!(report.end, SessionEnd::TransportError(_)) {
            self.transport_errors.fetch_add(1, Ordering::Relaxed);
        }

        match report.outcome {
            FinalizeOutcome::Saved(_) => {
                self.recordings_saved.fetch_add(1, Ordering::Relaxed);
            }
            FinalizeOutcome::Empty => {
                self.empty_sessions.fetch_add(1, Ordering::Relaxed);
            }
            FinalizeOutcome::WriteFailed(_) => {
                self.write_failures.fetch_add(1, Ordering::Relaxed);
            }
            FinalizeOutcome::AlreadyFinalized => {}
        }
    }

    /// A session task ended without producing a report (cancelled or panicked).
    pub fn session_aborted(&self) {
        self.session_ended();
    }

    fn session_ended(&self) {
        // Saturating; an unpaired end must not wrap the gauge.
        let _ = self
            .active_sessions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1)));
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            total_sessions: self.total_sessions.load(Ordering::Relaxed),
            recordings_saved: self.recordings_saved.load(Ordering::Relaxed),
            empty_sessions: self.empty_sessions.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::recording::SavedRecording;
    use std::path::PathBuf;

    fn report(end: SessionEnd, outcome: FinalizeOutcome) -> SessionReport {
        SessionReport {
            identity: "caller".to_string(),
            end,
            greeting: None,
            echoed_frames: 0,
            outcome,
        }
    }

    fn disconnected() -> SessionEnd {
        SessionEnd::Disconnected {
            code: Some(1000),
            reason: None,
        }
    }

    #[test]
    fn test_metrics_track_session_outcomes() {
        let metrics = SessionMetrics::default();
        metrics.session_started();
        metrics.session_started();
        metrics.session_started();
        assert_eq!(metrics.snapshot().active_sessions, 3);

        let saved = SavedRecording {
            path: PathBuf::from("recordings/a.wav"),
            samples: 16000,
            duration_seconds: 1.0,
        };
        metrics.record_report(&report(disconnected(), FinalizeOutcome::Saved(saved)));
        metrics.record_report(&report(
            SessionEnd::TransportError("reset".to_string()),
            FinalizeOutcome::WriteFailed("disk full".to_string()),
        ));
        metrics.record_report(&report(disconnected(), FinalizeOutcome::Empty));

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                active_sessions: 0,
                total_sessions: 3,
                recordings_saved: 1,
                empty_sessions: 1,
                write_failures: 1,
                transport_errors: 1,
            }
        );
    }

    #[test]
    fn test_active_sessions_never_underflow() {
        let metrics = SessionMetrics::default();
        metrics.session_aborted();
        assert_eq!(metrics.snapshot().active_sessions, 0);
    }

    #[test]
    fn test_new_session_uses_configured_greeting() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = RecordingWriter::new(dir.path(), 16000, "session").unwrap();
        let clip = Arc::new(GreetingClip::new(16000, vec![0; 320]));

        let with_greeting = AppState::new(AppConfig::default(), Some(clip), recorder.clone());
        let mut session = with_greeting.new_session("caller");
        assert_eq!(session.phase(), crate::audio::session::SessionPhase::Greeting);
        assert_eq!(session.finalize(), FinalizeOutcome::Empty);

        let without = AppState::new(AppConfig::default(), None, recorder);
        let mut session = without.new_session("caller");
        assert_eq!(session.phase(), crate::audio::session::SessionPhase::Echoing);
        assert_eq!(session.finalize(), FinalizeOutcome::Empty);
    }
}
