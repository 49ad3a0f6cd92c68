//! HTTP API for the vocalis speech server.
//!
//! `POST /tts` answers with `audio/wav` or a `{ "error": ... }` JSON body.
//! CORS-permissive so browser front-ends on other origins can call it.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tracing::error;

use vocalis_core::types::{ErrorBody, HealthStatus, TtsRequest};
use vocalis_core::wav::CONTENT_TYPE;

use crate::error::TtsError;
use crate::model::ModelLoader;
use crate::tts::TtsService;

/// Error body for a model that could not be loaded. The cause is only logged.
pub const MODEL_LOAD_FAILED: &str = "Model failed to load";

/// Build the axum router around a shared [`TtsService`].
pub fn router<L: ModelLoader>(service: TtsService<L>) -> Router {
    Router::new()
        .route("/tts", post(tts::<L>))
        .route("/health", get(health::<L>))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

// ─── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<TtsError> for ApiError {
    fn from(err: TtsError) -> Self {
        match err {
            TtsError::InvalidInput(msg) => ApiError::bad_request(msg),
            other => ApiError::internal(other.to_string()),
        }
    }
}

// ─── Handlers ──────────────────────────────────────────────────────────────

async fn tts<L: ModelLoader>(
    State(service): State<TtsService<L>>,
    body: Result<Json<TtsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    // Model readiness is checked before the body is inspected.
    if service.model().get().await.is_err() {
        return Err(ApiError::internal(MODEL_LOAD_FAILED));
    }

    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let text = req.text.unwrap_or_default();

    // Blank text comes back as `InvalidInput`, which maps to 400.
    let wav = service
        .synthesize(&text, req.speaker.as_deref())
        .await
        .inspect_err(|e| {
            if !matches!(e, TtsError::InvalidInput(_)) {
                error!("generation error: {e}");
            }
        })?;

    Ok(([(header::CONTENT_TYPE, CONTENT_TYPE)], wav).into_response())
}

async fn health<L: ModelLoader>(State(service): State<TtsService<L>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".into(),
        model_loaded: service.model().is_loaded(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use vocalis_core::text_prep::NO_TEXT_PROVIDED;
    use vocalis_core::types::SynthesisConfig;

    use super::*;
    use crate::model::fakes::{FakeLoader, FakeModel};

    async fn spawn(loader: FakeLoader) -> String {
        let app = router(TtsService::new(loader, SynthesisConfig::default()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    async fn post_json(base: &str, body: serde_json::Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{base}/tts"))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn error_of(resp: reqwest::Response) -> String {
        resp.json::<ErrorBody>().await.unwrap().error
    }

    #[tokio::test]
    async fn missing_text_is_400() {
        let base = spawn(FakeLoader::new(FakeModel::new(10))).await;

        for body in [
            serde_json::json!({}),
            serde_json::json!({ "text": null }),
            serde_json::json!({ "text": "" }),
            serde_json::json!({ "text": "  \n", "speaker": "am_adam" }),
        ] {
            let resp = post_json(&base, body).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            assert_eq!(error_of(resp).await, NO_TEXT_PROVIDED);
        }
    }

    #[tokio::test]
    async fn valid_text_returns_wav() {
        let model = FakeModel::new(480);
        let base = spawn(FakeLoader::new(model.clone())).await;

        let resp = post_json(&base, serde_json::json!({ "text": "Hello there." })).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], CONTENT_TYPE);

        let bytes = resp.bytes().await.unwrap();
        let reader = hound::WavReader::new(Cursor::new(bytes.to_vec())).unwrap();
        assert_eq!(reader.len(), 480);
        assert_eq!(model.calls()[0].speaker, "af_heart");
    }

    #[tokio::test]
    async fn speaker_is_forwarded() {
        let model = FakeModel::new(10);
        let base = spawn(FakeLoader::new(model.clone())).await;

        let resp = post_json(
            &base,
            serde_json::json!({ "text": "Hi there.", "speaker": "bm_george" }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(model.calls()[0].speaker, "bm_george");
    }

    #[tokio::test]
    async fn model_load_failure_is_500_and_retried() {
        let loader = FakeLoader::failing_first(FakeModel::new(10), 1);
        let base = spawn(loader.clone()).await;

        let resp = post_json(&base, serde_json::json!({ "text": "Hello." })).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_of(resp).await, MODEL_LOAD_FAILED);

        let resp = post_json(&base, serde_json::json!({ "text": "Hello." })).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(loader.load_count(), 2);
    }

    #[tokio::test]
    async fn model_load_is_checked_before_body() {
        let base = spawn(FakeLoader::failing_first(FakeModel::new(10), usize::MAX)).await;

        let resp = post_json(&base, serde_json::json!({})).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_of(resp).await, MODEL_LOAD_FAILED);
    }

    #[tokio::test]
    async fn generation_failure_passes_message_through() {
        let base = spawn(FakeLoader::new(FakeModel::failing("speaker 'Nobody' not found"))).await;

        let resp = post_json(&base, serde_json::json!({ "text": "Hello." })).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_of(resp).await, "speaker 'Nobody' not found");
    }

    #[tokio::test]
    async fn malformed_json_is_400_with_error_body() {
        let base = spawn(FakeLoader::new(FakeModel::new(10))).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/tts"))
            .header(header::CONTENT_TYPE, "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(!error_of(resp).await.is_empty());

        let resp = post_json(&base, serde_json::json!({ "text": 42 })).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_reports_load_state_without_loading() {
        let loader = FakeLoader::new(FakeModel::new(10));
        let base = spawn(loader.clone()).await;
        let client = reqwest::Client::new();

        let status: HealthStatus = client
            .get(format!("{base}/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status.status, "ok");
        assert!(!status.model_loaded);
        assert_eq!(loader.load_count(), 0);

        let _ = post_json(&base, serde_json::json!({ "text": "Hello." })).await;

        let status: HealthStatus = client
            .get(format!("{base}/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(status.model_loaded);
    }

    #[test]
    fn invalid_input_maps_to_400() {
        let err: ApiError = TtsError::InvalidInput("nope".into()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        let err: ApiError = TtsError::generation("boom").into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "boom");
    }
}
