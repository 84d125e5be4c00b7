//! Identity and sync status endpoints

use axum::{extract::State, Json};
use efc_common::events::LoadSource;
use serde::{Deserialize, Serialize};

use crate::library::LibraryStatus;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub status: LibraryStatus,
    pub owner_id: Option<String>,
    pub strategy: &'static str,
    pub sync_degraded: bool,
    pub phrase_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct IdentityRequest {
    /// `null` signs out
    pub owner_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    pub source: LoadSource,
    pub session: SessionResponse,
}

async fn describe(state: &AppState) -> SessionResponse {
    SessionResponse {
        status: state.library.status().await,
        owner_id: state.library.owner_id().await,
        strategy: state.library.strategy_name().await,
        sync_degraded: state.library.is_sync_degraded(),
        phrase_count: state.library.snapshot().await.len(),
    }
}

/// GET /api/session
pub async fn get_session(State(state): State<AppState>) -> Json<SessionResponse> {
    Json(describe(&state).await)
}

/// POST /api/session/identity
pub async fn switch_identity(
    State(state): State<AppState>,
    Json(request): Json<IdentityRequest>,
) -> Json<IdentityResponse> {
    let owner_id = request.owner_id.filter(|o| !o.trim().is_empty());
    let source = state.library.switch_identity(owner_id).await;
    Json(IdentityResponse {
        source,
        session: describe(&state).await,
    })
}
