//! # Error Handling
//!
//! This module defines the custom error types used across the service:
//!
//! - **AppError**: errors returned from HTTP handlers, converted to JSON responses
//! - **AudioError**: failures while loading the greeting clip or writing a recording
//!
//! Transport failures of a live session are modelled separately by
//! [`crate::audio::port::TransportError`] because they never reach an HTTP response.
//!
//! ## Why custom errors:
//! None of these errors may terminate the process once it is serving. Giving each
//! failure a named variant lets the callers decide locally whether to log and
//! continue (greeting, recording) or answer the client (HTTP).

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors surfaced by HTTP handlers.
///
/// ## Error Categories:
/// - **Internal**: Server-side problems (500 errors)
/// - **BadRequest**: Client sent an invalid request, e.g. a failed WebSocket handshake (400 errors)
#[derive(Debug)]
pub enum AppError {
    /// Internal server errors
    Internal(String),

    /// Client sent invalid or malformed data
    BadRequest(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
        }
    }
}

/// Converts errors into HTTP responses.
///
/// ## JSON Response Format:
/// ```json
/// {
///   "error": {
///     "type": "bad_request",
///     "message": "WebSocket handshake failed",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        match self {
            AppError::Internal(_) => actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => actix_web::http::StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (error_type, message) = match self {
            AppError::Internal(msg) => ("internal_error", msg),
            AppError::BadRequest(msg) => ("bad_request", msg),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

/// Failures of the audio file collaborators.
///
/// ## When these happen:
/// - **Io**: the greeting file can't be opened/parsed, or a recording can't be created
/// - **UnsupportedFormat**: the greeting WAV uses a sample format we can't convert
/// - **EmptyClip**: the greeting WAV decoded to zero samples
/// - **Write**: the recording file was created but writing samples into it failed
#[derive(Debug)]
pub enum AudioError {
    Io(io::Error),
    UnsupportedFormat(String),
    EmptyClip(PathBuf),
    Write { path: PathBuf, source: io::Error },
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::Io(err) => write!(f, "I/O error: {}", err),
            AudioError::UnsupportedFormat(msg) => write!(f, "Unsupported audio format: {}", msg),
            AudioError::EmptyClip(path) => {
                write!(f, "Greeting clip {} contains no samples", path.display())
            }
            AudioError::Write { path, source } => {
                write!(f, "Failed to write {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for AudioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AudioError::Io(err) => Some(err),
            AudioError::Write { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for AudioError {
    fn from(err: io::Error) -> Self {
        AudioError::Io(err)
    }
}
