//! Pictogram search endpoints

use axum::{extract::{Query, State}, Json};
use efc_common::Pictogram;
use serde::{Deserialize, Serialize};

use crate::pictograms::Suggestions;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PictogramSearchParams {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SuggestRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct PictogramListResponse {
    pub pictograms: Vec<Pictogram>,
}

/// GET /api/pictograms/search?q=&limit=
///
/// Immediate lookup; failures yield an empty list.
pub async fn search_pictograms(
    State(state): State<AppState>,
    Query(params): Query<PictogramSearchParams>,
) -> Json<PictogramListResponse> {
    let limit = params.limit.unwrap_or(state.config.pictogram_search_limit);
    let pictograms = state.pictogram_search.search(&params.q, limit).await;
    Json(PictogramListResponse { pictograms })
}

/// POST /api/pictograms/suggest
///
/// Feeds typed input into the debounced suggestion stream.
pub async fn suggest(
    State(state): State<AppState>,
    Json(request): Json<SuggestRequest>,
) -> Json<Suggestions> {
    state.suggestions.query(&request.query);
    Json(state.suggestions.current())
}

/// GET /api/pictograms/suggestions
pub async fn current_suggestions(State(state): State<AppState>) -> Json<Suggestions> {
    Json(state.suggestions.current())
}
