//! Phrase library endpoints

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use efc_common::{Phrase, Pictogram};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::editor::PhraseDraft;
use crate::error::{ApiError, ApiResult};
use crate::export::{self, EXPORT_FILE_NAME};
use crate::search;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DraftPictogramRequest {
    #[serde(default)]
    pub draft: PhraseDraft,
    pub pictogram: Pictogram,
}

#[derive(Debug, Serialize)]
pub struct DraftPictogramResponse {
    pub draft: PhraseDraft,
    pub added: bool,
}

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct MostUsedParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct PhraseListResponse {
    pub phrases: Vec<Phrase>,
    pub count: usize,
}

impl From<Vec<Phrase>> for PhraseListResponse {
    fn from(phrases: Vec<Phrase>) -> Self {
        Self {
            count: phrases.len(),
            phrases,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub phrase_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub imported: usize,
    pub phrase_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ExportFileResponse {
    pub path: PathBuf,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// GET /api/phrases
pub async fn list_phrases(State(state): State<AppState>) -> Json<PhraseListResponse> {
    Json(state.library.snapshot().await.into())
}

/// GET /api/phrases/:id
pub async fn get_phrase(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Phrase>> {
    state
        .library
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("phrase {}", id)))
}

/// POST /api/phrases
pub async fn add_phrase(
    State(state): State<AppState>,
    Json(mut draft): Json<PhraseDraft>,
) -> ApiResult<Json<Phrase>> {
    draft.dedup_pictograms();
    draft.validate()?;
    let phrase = state
        .library
        .add(&draft.text, draft.pictograms, draft.kind)
        .await?;
    Ok(Json(phrase))
}

/// PUT /api/phrases/:id
pub async fn update_phrase(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut draft): Json<PhraseDraft>,
) -> ApiResult<Json<Phrase>> {
    draft.dedup_pictograms();
    draft.validate()?;
    state
        .library
        .update(&id, &draft.text, draft.pictograms, draft.kind)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("phrase {}", id)))
}

/// POST /api/drafts/pictograms
///
/// Adds a pictogram to an editor draft, extending its text with the word.
pub async fn add_draft_pictogram(
    Json(request): Json<DraftPictogramRequest>,
) -> Json<DraftPictogramResponse> {
    let mut draft = request.draft;
    let added = draft.add_pictogram(request.pictogram);
    Json(DraftPictogramResponse { draft, added })
}

/// DELETE /api/phrases/:id
pub async fn delete_phrase(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let deleted = state.library.delete(&id).await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// GET /api/search?q=
pub async fn search_phrases(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Json<PhraseListResponse> {
    let phrases = state.library.snapshot().await;
    Json(search::search(&phrases, &params.q).into())
}

/// GET /api/most-used?limit=
pub async fn most_used(
    State(state): State<AppState>,
    Query(params): Query<MostUsedParams>,
) -> Json<PhraseListResponse> {
    let limit = params.limit.unwrap_or(state.config.most_used_limit);
    let phrases = state.library.snapshot().await;
    Json(search::most_used(&phrases, limit).into())
}

/// GET /api/manage?q=
pub async fn manage_listing(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Json<PhraseListResponse> {
    let phrases = state.library.snapshot().await;
    Json(search::manage_listing(&phrases, &params.q).into())
}

/// POST /api/library/reset
pub async fn reset_library(State(state): State<AppState>) -> ApiResult<Json<CountResponse>> {
    let phrase_count = state.library.reset_to_defaults().await?;
    Ok(Json(CountResponse { phrase_count }))
}

/// GET /api/library/export
pub async fn export_library(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let document = state.library.export_json().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
            ),
        ],
        document,
    ))
}

/// POST /api/library/export-file
///
/// Writes the export into the board's own export folder.
pub async fn export_library_file(
    State(state): State<AppState>,
) -> ApiResult<Json<ExportFileResponse>> {
    let dir = state.export_dir.as_deref().ok_or_else(|| {
        efc_common::Error::Config("no export folder configured".to_string())
    })?;
    let phrases = state.library.snapshot().await;
    let path = export::write_export(&phrases, dir).await?;
    Ok(Json(ExportFileResponse {
        path,
        count: phrases.len(),
    }))
}

/// POST /api/library/import (body: JSON array of phrases)
pub async fn import_library(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<Json<ImportResponse>> {
    let phrases = export::parse_import(&body)?;
    let imported = state.library.import(phrases).await?;
    let phrase_count = state.library.snapshot().await.len();
    Ok(Json(ImportResponse {
        imported,
        phrase_count,
    }))
}

/// POST /api/library/clear-cache
pub async fn clear_cache(State(state): State<AppState>) -> Json<StatusResponse> {
    state.library.clear_cache().await;
    info!("Local cache cleared via API");
    Json(StatusResponse {
        status: "cleared".to_string(),
    })
}
