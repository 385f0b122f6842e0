//! HTTP surface. Both analysis endpoints answer 200 with a domain payload,
//! whatever happened upstream.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;
use verisight_engine::{ClaimVerdict, ClaimVerifier, MediaAnalyzer, MediaFailure, MediaReport};
use verisight_forensics::MediaInput;

const UPLOAD_FIELD: &str = "file";

#[derive(Clone)]
pub struct AppState {
    pub media: Arc<MediaAnalyzer>,
    pub claims: Arc<ClaimVerifier>,
}

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/analyze-media", post(analyze_media))
        .route("/verify-claim", post(verify_claim))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn analyze_media(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Json<MediaReport> {
    match read_upload(multipart).await {
        Ok(input) => Json(state.media.analyze(input).await),
        Err(reason) => {
            warn!(reason = %reason, "http.analyze_media.bad_upload");
            let failure = MediaFailure::SystemFault(reason);
            Json(MediaReport::from_failure(&failure, state.media.policy()))
        }
    }
}

async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<MediaInput, String> {
    let mut multipart = multipart.map_err(|e| e.body_text())?;
    while let Some(field) = multipart.next_field().await.map_err(|e| e.body_text())? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let mime = field.content_type().map(str::to_owned);
        let bytes = field.bytes().await.map_err(|e| e.body_text())?;
        if bytes.is_empty() {
            return Err("uploaded file is empty".into());
        }
        return Ok(MediaInput::from_upload(bytes.to_vec(), mime.as_deref()));
    }
    Err(format!("no `{UPLOAD_FIELD}` field in upload"))
}

async fn verify_claim(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Json<ClaimVerdict> {
    match body {
        Ok(body) => Json(state.claims.verify(&claim_text(&body)).await),
        Err(rejection) => {
            warn!(reason = %rejection.body_text(), "http.verify_claim.bad_body");
            Json(ClaimVerdict::error(format!(
                "Invalid request body: {}",
                rejection.body_text()
            )))
        }
    }
}

/// `text` of a JSON object body; anything else reads as an empty claim.
fn claim_text(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("text").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_default()
}
