//! Built utterance endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use efc_common::PhraseKind;
use serde::{Deserialize, Serialize};

use crate::composer::BuiltUtterance;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct QuickAddRequest {
    pub text: String,
    #[serde(default, rename = "type")]
    pub kind: PhraseKind,
}

#[derive(Debug, Serialize)]
pub struct PlayResponse {
    pub spoken: bool,
    pub utterance: BuiltUtterance,
}

/// GET /api/utterance
pub async fn get_utterance(State(state): State<AppState>) -> Json<BuiltUtterance> {
    Json(state.composer.current())
}

/// POST /api/utterance/select/:id
pub async fn select_phrase(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BuiltUtterance>> {
    state
        .composer
        .select(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("phrase {}", id)))
}

/// POST /api/utterance/submit
///
/// Blank queries leave the utterance unchanged.
pub async fn submit_query(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> ApiResult<Json<BuiltUtterance>> {
    let utterance = state.composer.submit(&request.query).await?;
    Ok(Json(utterance.unwrap_or_else(|| state.composer.current())))
}

/// POST /api/utterance/quick-add
pub async fn quick_add(
    State(state): State<AppState>,
    Json(request): Json<QuickAddRequest>,
) -> ApiResult<Json<BuiltUtterance>> {
    let utterance = state.composer.quick_add(&request.text, request.kind).await?;
    Ok(Json(utterance))
}

/// DELETE /api/utterance/pictograms/:index
pub async fn remove_pictogram(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> ApiResult<Json<BuiltUtterance>> {
    state
        .composer
        .remove_pictogram(index)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("pictogram index {}", index)))
}

/// POST /api/utterance/clear
pub async fn clear_utterance(State(state): State<AppState>) -> Json<BuiltUtterance> {
    Json(state.composer.clear())
}

/// POST /api/utterance/play
pub async fn play_utterance(State(state): State<AppState>) -> ApiResult<Json<PlayResponse>> {
    let spoken = state.composer.play().await?;
    Ok(Json(PlayResponse {
        spoken,
        utterance: state.composer.current(),
    }))
}
