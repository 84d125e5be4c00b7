//! efc-devsync library - development sync endpoint
//!
//! Lets a running board push its phrase list back into the bundled default
//! dataset file. Development convenience only; never shipped with the board.

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use efc_common::Phrase;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Dataset file overwritten on every save
    pub target_path: Arc<PathBuf>,
}

impl AppState {
    pub fn new(target_path: PathBuf) -> Self {
        Self {
            target_path: Arc::new(target_path),
        }
    }
}

/// Build application router
///
/// Only `POST /save-phrases` exists; every other method or path is a 404,
/// except `OPTIONS`, which answers every path for CORS preflight.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/save-phrases", post(save_phrases).fallback(not_found))
        .fallback(not_found)
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Serialize with 4-space indentation
pub fn to_four_space_json(value: &Value) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    serde::Serialize::serialize(value, &mut serializer)?;
    Ok(out)
}

/// POST /save-phrases
pub async fn save_phrases(State(state): State<AppState>, body: Bytes) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            warn!("Rejected save: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid JSON" })),
            )
                .into_response();
        }
    };

    match serde_json::from_value::<Vec<Phrase>>(value.clone()) {
        Ok(phrases) => info!(count = phrases.len(), "Saving phrase list"),
        Err(e) => warn!("Body is valid JSON but not a phrase list, saving anyway: {}", e),
    }

    let document = match to_four_space_json(&value) {
        Ok(document) => document,
        Err(e) => {
            error!("Failed to serialize phrases: {}", e);
            return write_failed(e.to_string());
        }
    };

    if let Err(e) = tokio::fs::write(state.target_path.as_path(), document).await {
        error!(
            path = %state.target_path.display(),
            "Failed to write phrase file: {}", e
        );
        return write_failed(e.to_string());
    }

    info!(path = %state.target_path.display(), "Updated default phrase file");
    (StatusCode::OK, Json(json!({ "success": true }))).into_response()
}

fn write_failed(reason: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": reason })),
    )
        .into_response()
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// CORS headers on every response; `OPTIONS` short-circuits with 204
async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}
