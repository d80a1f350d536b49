use crate::{error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = &state.config;
    let settings = config.session_settings();
    let current = serde_json::to_value(&**config)
        .map_err(|e| AppError::Internal(format!("failed to serialize config: {}", e)))?;

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": current,
        "effective": {
            "pacing_delay_ms": settings.pacing_delay().as_millis() as u64,
            "greeting_loaded": state.greeting.is_some()
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::recording::RecordingWriter;
    use crate::config::AppConfig;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_get_config() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = RecordingWriter::new(dir.path(), 16000, "session").unwrap();
        let state = AppState::new(AppConfig::default(), None, recorder);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/api/v1/config", web::get().to(get_config)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/config").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["config"]["server"]["port"], 8080);
        assert_eq!(body["config"]["audio"]["session_sample_rate"], 16000);
        assert_eq!(body["config"]["recording"]["fallback_identity"], "session");
        assert_eq!(body["effective"]["pacing_delay_ms"], 90);
        assert_eq!(body["effective"]["greeting_loaded"], false);
    }
}
