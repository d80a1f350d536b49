use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.metrics.snapshot();
    let config = &state.config;

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.get_uptime_seconds(),
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "greeting": greeting_status(&state),
        "recordings": {
            "output_dir": state.recorder.output_dir().display().to_string(),
            "sample_rate": state.recorder.sample_rate()
        },
        "sessions": metrics
    }))
}

fn greeting_status(state: &AppState) -> serde_json::Value {
    match &state.greeting {
        Some(clip) => json!({
            "loaded": true,
            "sample_rate": clip.sample_rate(),
            "bytes": clip.byte_len(),
            "duration_seconds": clip.duration().as_secs_f64()
        }),
        None => json!({
            "loaded": false,
            "configured_path": state.config.greeting_path().map(|p| p.display().to_string())
        }),
    }
}
