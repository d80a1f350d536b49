//! # Echo Session Controller
//!
//! Drives one connection from accept to disconnect. A session walks through these
//! phases, strictly in order:
//!
//! 1. **Greeting** (only with a greeting clip): the clip is sent in 100ms chunks, each
//!    followed by a fixed pacing delay of 90% of the chunk duration. Frames arriving
//!    meanwhile are read and discarded, which keeps a disconnect visible during playback.
//! 2. **Draining** (only after a greeting): queued inbound audio is discarded for at most
//!    the drain window, stopping early at the first receive that stays idle for the
//!    idle timeout.
//! 3. **Echoing**: every inbound frame is sent straight back at the canonical session
//!    rate, then appended to the session buffer. Only a disconnect or a transport
//!    error ends this phase.
//! 4. **Finalizing**: the buffer is written as one WAV file (if it holds any samples).
//! 5. **Closed**.
//!
//! ## Ordering:
//! Exactly one receive, send or pacing wait is outstanding at any time. The echo of
//! frame N is sent before frame N+1 is read, and the buffer keeps arrival order.
//!
//! ## Failure handling:
//! - a failing greeting send (or drain receive) abandons the greeting and moves on to echoing
//! - a disconnect in any phase goes straight to finalizing
//! - a failed recording write is logged and reported, never retried
//!
//! Finalize runs exactly once: at the end of [`SessionController::run`], or from
//! `Drop` if the session task was cancelled or panicked first.

use crate::audio::buffer::SessionBuffer;
use crate::audio::frame::AudioFrame;
use crate::audio::greeting::GreetingClip;
use crate::audio::pcm;
use crate::audio::port::{AudioStreamPort, InboundEvent, TransportError};
use crate::audio::recording::{RecordingWriter, SavedRecording};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

/// Timing and rate parameters for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Rate declared on every echoed frame and used for the recording
    pub session_sample_rate: u32,
    /// Nominal duration of one greeting chunk
    pub chunk_duration: Duration,
    /// Fraction of `chunk_duration` waited after each greeting chunk
    pub pacing_factor: f64,
    /// Upper bound on the post-greeting drain
    pub drain_window: Duration,
    /// Per-receive timeout while draining
    pub drain_idle_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            session_sample_rate: 16000,
            chunk_duration: Duration::from_millis(100),
            pacing_factor: 0.9,
            drain_window: Duration::from_millis(500),
            drain_idle_timeout: Duration::from_millis(50),
        }
    }
}

impl SessionSettings {
    /// Wait after each greeting chunk. Fixed wall-clock budget, independent of the
    /// actual chunk length.
    pub fn pacing_delay(&self) -> Duration {
        let nanos = self.chunk_duration.as_nanos() as f64 * self.pacing_factor;
        Duration::from_nanos(nanos.round() as u64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Greeting,
    Draining,
    Echoing,
    Finalizing,
    Closed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Greeting => "greeting",
            SessionPhase::Draining => "draining",
            SessionPhase::Echoing => "echoing",
            SessionPhase::Finalizing => "finalizing",
            SessionPhase::Closed => "closed",
        }
    }
}

/// Why the session stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    Disconnected {
        code: Option<u16>,
        reason: Option<String>,
    },
    TransportError(String),
    /// `run` was called on a session that had already been finalized
    AlreadyClosed,
}

/// Result of finalizing a session.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeOutcome {
    Saved(SavedRecording),
    /// Nothing was received, so no file was written
    Empty,
    /// Samples were received but the file could not be written
    WriteFailed(String),
    /// Finalize had already run for this session
    AlreadyFinalized,
}

/// What happened during greeting playback and the drain that follows it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GreetingReport {
    pub chunks_sent: usize,
    pub bytes_sent: usize,
    /// Audio duration of the bytes sent (bytes / 2 / sample rate)
    pub sent_duration: Duration,
    /// Frames read and dropped between greeting chunks
    pub discarded_during_playback: usize,
    /// Frames read and dropped by the post-greeting drain
    pub drained_frames: usize,
    /// Every chunk was sent
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub identity: String,
    pub end: SessionEnd,
    pub greeting: Option<GreetingReport>,
    pub echoed_frames: u64,
    pub outcome: FinalizeOutcome,
}

/// Outcome of a greeting-side step: keep going, or the peer went away.
type StepResult = Result<Option<SessionEnd>, TransportError>;

pub struct SessionController {
    identity: String,
    greeting: Option<Arc<GreetingClip>>,
    settings: SessionSettings,
    recorder: RecordingWriter,
    buffer: SessionBuffer,
    phase: SessionPhase,
    finalized: bool,
}

impl SessionController {
    pub fn new(
        identity: impl Into<String>,
        greeting: Option<Arc<GreetingClip>>,
        settings: SessionSettings,
        recorder: RecordingWriter,
    ) -> Self {
        let phase = if greeting.is_some() {
            SessionPhase::Greeting
        } else {
            SessionPhase::Echoing
        };

        Self {
            identity: identity.into(),
            greeting,
            settings,
            recorder,
            buffer: SessionBuffer::new(),
            phase,
            finalized: false,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Run the session to completion and finalize it.
    pub async fn run<P>(&mut self, port: &mut P) -> SessionReport
    where
        P: AudioStreamPort + ?Sized,
    {
        if self.finalized {
            warn!(phase = self.phase.as_str(), "session already finalized; not running it again");
            return SessionReport {
                identity: self.identity.clone(),
                end: SessionEnd::AlreadyClosed,
                greeting: None,
                echoed_frames: 0,
                outcome: FinalizeOutcome::AlreadyFinalized,
            };
        }

        let mut greeting_report = None;
        let mut ended = None;

        if let Some(clip) = self.greeting.clone() {
            let mut report = GreetingReport::default();
            ended = self.greet(&clip, port, &mut report).await;
            greeting_report = Some(report);
        }

        let mut echoed_frames = 0;
        let end = match ended {
            Some(end) => end,
            None => {
                self.phase = SessionPhase::Echoing;
                let end = self.echo(port, &mut echoed_frames).await;
                debug!(
                    "echo phase ended after {} frames ({} buffered, {:.2}s)",
                    echoed_frames,
                    self.buffer.block_count(),
                    self.buffer.duration_seconds(self.settings.session_sample_rate)
                );
                end
            }
        };

        match &end {
            SessionEnd::Disconnected { code, reason } => info!(
                "websocket disconnected: code={}, reason={}",
                code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()),
                reason.as_deref().unwrap_or("")
            ),
            SessionEnd::TransportError(err) => warn!("websocket error: {}", err),
            SessionEnd::AlreadyClosed => {}
        }

        let outcome = self.finalize();

        SessionReport {
            identity: self.identity.clone(),
            end,
            greeting: greeting_report,
            echoed_frames,
            outcome,
        }
    }

    /// Greeting playback followed by the drain.
    ///
    /// Returns `Some` only when the peer disconnected; send and receive failures
    /// abandon the greeting and fall through to echoing.
    async fn greet<P>(
        &mut self,
        clip: &GreetingClip,
        port: &mut P,
        report: &mut GreetingReport,
    ) -> Option<SessionEnd>
    where
        P: AudioStreamPort + ?Sized,
    {
        self.phase = SessionPhase::Greeting;
        match self.play_greeting(clip, port, report).await {
            Ok(None) => {}
            Ok(Some(end)) => return Some(end),
            Err(err) => {
                warn!("failed to send greeting: {}", err);
                return None;
            }
        }

        self.phase = SessionPhase::Draining;
        match self.drain(port, report).await {
            Ok(end) => end,
            Err(err) => {
                warn!("failed to drain after greeting: {}", err);
                None
            }
        }
    }

    async fn play_greeting<P>(
        &mut self,
        clip: &GreetingClip,
        port: &mut P,
        report: &mut GreetingReport,
    ) -> StepResult
    where
        P: AudioStreamPort + ?Sized,
    {
        let pacing = self.settings.pacing_delay();

        for chunk in clip.chunks(self.settings.chunk_duration) {
            send_frame(port, &chunk).await?;
            report.chunks_sent += 1;
            report.bytes_sent += chunk.len();

            let deadline = Instant::now() + pacing;
            if let Some(end) = self.discard_until(port, deadline, report).await? {
                return Ok(Some(end));
            }
        }

        report.completed = true;
        report.sent_duration = Duration::from_secs_f64(
            pcm::sample_count(report.bytes_sent) as f64 / clip.sample_rate() as f64,
        );
        debug!(
            "greeting sent in {} chunks (~{:.2}s)",
            report.chunks_sent,
            report.sent_duration.as_secs_f64()
        );
        Ok(None)
    }

    /// Pacing wait: read and drop inbound frames until `deadline`.
    async fn discard_until<P>(
        &mut self,
        port: &mut P,
        deadline: Instant,
        report: &mut GreetingReport,
    ) -> StepResult
    where
        P: AudioStreamPort + ?Sized,
    {
        loop {
            match time::timeout_at(deadline, port.receive()).await {
                Err(_) => return Ok(None),
                Ok(Ok(InboundEvent::Frame(_))) => report.discarded_during_playback += 1,
                Ok(Ok(InboundEvent::Closed { code, reason })) => {
                    return Ok(Some(SessionEnd::Disconnected { code, reason }))
                }
                Ok(Err(err)) => return Err(err),
            }
        }
    }

    /// Best-effort drain: stops when the window is used up or on the first idle receive.
    async fn drain<P>(&mut self, port: &mut P, report: &mut GreetingReport) -> StepResult
    where
        P: AudioStreamPort + ?Sized,
    {
        let started = Instant::now();
        let mut drained = 0;

        while started.elapsed() < self.settings.drain_window {
            match time::timeout(self.settings.drain_idle_timeout, port.receive()).await {
                Err(_) => break,
                Ok(Ok(InboundEvent::Frame(_))) => drained += 1,
                Ok(Ok(InboundEvent::Closed { code, reason })) => {
                    report.drained_frames += drained;
                    return Ok(Some(SessionEnd::Disconnected { code, reason }));
                }
                Ok(Err(err)) => {
                    report.drained_frames += drained;
                    return Err(err);
                }
            }
        }

        report.drained_frames += drained;
        if drained > 0 {
            debug!("drained {} queued audio packets after greeting", drained);
        }
        Ok(None)
    }

    async fn echo<P>(&mut self, port: &mut P, echoed_frames: &mut u64) -> SessionEnd
    where
        P: AudioStreamPort + ?Sized,
    {
        loop {
            let data = match port.receive().await {
                Ok(InboundEvent::Frame(data)) => data,
                Ok(InboundEvent::Closed { code, reason }) => {
                    return SessionEnd::Disconnected { code, reason }
                }
                Err(err) => return SessionEnd::TransportError(err.to_string()),
            };

            let frame = AudioFrame::new(data, self.settings.session_sample_rate);
            if let Err(err) = send_frame(port, &frame).await {
                return SessionEnd::TransportError(err.to_string());
            }

            self.buffer.append_pcm(frame.data());
            *echoed_frames += 1;
        }
    }

    /// Persist the buffered audio. Runs at most once; later calls return
    /// [`FinalizeOutcome::AlreadyFinalized`] and touch nothing.
    pub fn finalize(&mut self) -> FinalizeOutcome {
        if self.finalized {
            return FinalizeOutcome::AlreadyFinalized;
        }
        self.finalized = true;
        self.phase = SessionPhase::Finalizing;

        let outcome = if self.buffer.is_empty() {
            info!("no audio chunks received; nothing to save.");
            FinalizeOutcome::Empty
        } else {
            let samples = self.buffer.take_samples();
            match self.recorder.write(&self.identity, samples) {
                Ok(saved) => {
                    info!(
                        "saved recording: {} (samples={}, duration={:.2}s)",
                        saved.path.display(),
                        saved.samples,
                        saved.duration_seconds
                    );
                    FinalizeOutcome::Saved(saved)
                }
                Err(err) => {
                    error!("failed to write WAV file: {}", err);
                    FinalizeOutcome::WriteFailed(err.to_string())
                }
            }
        };

        self.phase = SessionPhase::Closed;
        outcome
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if !self.finalized {
            warn!(phase = self.phase.as_str(), "session ended without finalize; finalizing now");
            self.finalize();
        }
    }
}

async fn send_frame<P>(port: &mut P, frame: &AudioFrame) -> Result<(), TransportError>
where
    P: AudioStreamPort + ?Sized,
{
    let text = frame
        .to_message()
        .to_json()
        .map_err(|err| TransportError::Protocol(format!("failed to encode frame: {}", err)))?;
    port.send_text(text).await
}
