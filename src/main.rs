//! # Echo Loopback - Main Application Entry Point
//!
//! Real-time audio loopback service for testing voice pipelines. Each WebSocket
//! connection on `/live/{path}` hears a greeting clip, then gets every audio frame
//! it sends echoed straight back. Everything the caller sent is saved as one WAV
//! file per session when the connection ends.
//!
//! ## Application Architecture:
//! - **config**: Application configuration (TOML file + environment variables)
//! - **state**: Shared state: config, greeting clip, recording writer, metrics
//! - **audio**: The per-connection session controller and its collaborators
//! - **websocket**: Actix WebSocket glue running one session per connection
//! - **health** / **handlers**: Status and configuration endpoints
//! - **error**: Custom error types and HTTP error responses

mod audio;
mod config;
mod error;
mod handlers;
mod health;
mod state;
mod websocket;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use audio::greeting::GreetingClip;
use audio::recording::RecordingWriter;
use config::AppConfig;
use state::AppState;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Sets up logging** for debugging and monitoring
/// 2. **Loads configuration** from files and environment variables
/// 3. **Prepares shared resources**: recordings directory and greeting clip
/// 4. **Configures the HTTP server** with middleware and routes
/// 5. **Handles graceful shutdown** when receiving system signals
///
/// A missing greeting is logged and the service runs without it; a recordings
/// directory that can't be created stops startup.
#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting echo-loopback v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    let recorder = RecordingWriter::new(
        &config.recording.output_dir,
        config.audio.session_sample_rate,
        config.recording.fallback_identity.clone(),
    )?;
    info!("Recordings directory: {}", recorder.output_dir().display());

    let greeting_path = config.greeting_path();
    let greeting = GreetingClip::load_optional(greeting_path.as_deref());
    if greeting.is_none() {
        warn!("No greeting clip loaded; sessions start echoing immediately");
    }

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let app_state = AppState::new(config, greeting, recorder);

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .route("/live/{path}", web::get().to(websocket::live_socket))
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/config", web::get().to(handlers::get_config)),
            )
            .route("/health", web::get().to(health::health_check))
    })
    .disable_signals()
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        signal = wait_for_shutdown() => {
            match signal {
                Ok(name) => info!("Received {}, stopping server...", name),
                Err(e) => error!("Failed to listen for shutdown signals: {}; stopping server", e),
            }
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing (logging) system for the application.
///
/// ## Environment Variables:
/// - `RUST_LOG`: Controls what gets logged (e.g., "debug", "echo_loopback=debug")
/// - If not set, defaults to "echo_loopback=debug,actix_web=info"
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "echo_loopback=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Resolve when SIGTERM or SIGINT (Ctrl+C) arrives, naming the signal.
#[cfg(unix)]
async fn wait_for_shutdown() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        _ = sigint.recv() => Ok("SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}
