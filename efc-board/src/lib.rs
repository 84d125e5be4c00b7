//! efc-board library - AAC phrase board
//!
//! Phrase library store with offline-first persistence and optional remote
//! sync, search and composition of the built utterance, pictogram lookup,
//! speech playback, and the HTTP API exposing all of it.

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use efc_common::config::BoardConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod api;
pub mod composer;
pub mod debounce;
pub mod editor;
pub mod error;
pub mod export;
pub mod images;
pub mod library;
pub mod pictograms;
pub mod remote;
pub mod search;
pub mod speech;
pub mod storage;

pub use composer::{BuiltUtterance, Composer, ComposerSettings};
pub use error::{ApiError, ApiResult, LibraryError};
pub use library::{LibraryDeps, LibraryStatus, PhraseLibrary};

use pictograms::{PictogramSearch, PictogramSuggestions};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub library: PhraseLibrary,
    pub composer: Composer,
    pub suggestions: Arc<PictogramSuggestions>,
    pub pictogram_search: Arc<dyn PictogramSearch>,
    pub config: Arc<BoardConfig>,
    /// Folder receiving `/api/library/export-file`; unset disables it
    pub export_dir: Option<PathBuf>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        library: PhraseLibrary,
        composer: Composer,
        suggestions: Arc<PictogramSuggestions>,
        pictogram_search: Arc<dyn PictogramSearch>,
        config: BoardConfig,
    ) -> Self {
        Self {
            library,
            composer,
            suggestions,
            pictogram_search,
            config: Arc::new(config),
            export_dir: None,
            startup_time: efc_common::time::now(),
        }
    }

    pub fn with_export_dir(mut self, dir: PathBuf) -> Self {
        self.export_dir = Some(dir);
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use api::{phrases, pictograms, session, utterance};

    let library_routes = Router::new()
        .route(
            "/api/phrases",
            get(phrases::list_phrases).post(phrases::add_phrase),
        )
        .route("/api/drafts/pictograms", post(phrases::add_draft_pictogram))
        .route(
            "/api/phrases/:id",
            get(phrases::get_phrase)
                .put(phrases::update_phrase)
                .delete(phrases::delete_phrase),
        )
        .route("/api/search", get(phrases::search_phrases))
        .route("/api/most-used", get(phrases::most_used))
        .route("/api/manage", get(phrases::manage_listing))
        .route("/api/library/reset", post(phrases::reset_library))
        .route("/api/library/export", get(phrases::export_library))
        .route("/api/library/export-file", post(phrases::export_library_file))
        .route("/api/library/import", post(phrases::import_library))
        .route("/api/library/clear-cache", post(phrases::clear_cache));

    let utterance_routes = Router::new()
        .route("/api/utterance", get(utterance::get_utterance))
        .route("/api/utterance/select/:id", post(utterance::select_phrase))
        .route("/api/utterance/submit", post(utterance::submit_query))
        .route("/api/utterance/quick-add", post(utterance::quick_add))
        .route(
            "/api/utterance/pictograms/:index",
            delete(utterance::remove_pictogram),
        )
        .route("/api/utterance/clear", post(utterance::clear_utterance))
        .route("/api/utterance/play", post(utterance::play_utterance));

    let pictogram_routes = Router::new()
        .route("/api/pictograms/search", get(pictograms::search_pictograms))
        .route("/api/pictograms/suggest", post(pictograms::suggest))
        .route(
            "/api/pictograms/suggestions",
            get(pictograms::current_suggestions),
        );

    let session_routes = Router::new()
        .route("/api/session", get(session::get_session))
        .route("/api/session/identity", post(session::switch_identity))
        .route("/events", get(api::event_stream));

    Router::new()
        .merge(library_routes)
        .merge(utterance_routes)
        .merge(pictogram_routes)
        .merge(session_routes)
        .merge(api::health_routes())
        .layer(middleware::from_fn_with_state(state.clone(), guard_origin))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.allowed_origins))
        .with_state(state)
}

/// CORS for the configured browser origins only
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid allowed origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}

/// Reject state-changing requests sent by a browser from a foreign origin
///
/// CORS only hides responses; simple cross-site POSTs still reach the
/// handler. Requests without an `Origin` header (non-browser clients) pass.
async fn guard_origin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let mutating = !matches!(
        *request.method(),
        Method::GET | Method::HEAD | Method::OPTIONS
    );
    if mutating {
        if let Some(origin) = request.headers().get(header::ORIGIN) {
            let allowed = origin
                .to_str()
                .map(|o| state.config.allowed_origins.iter().any(|a| a == o))
                .unwrap_or(false);
            if !allowed {
                warn!(?origin, path = %request.uri().path(), "Rejected cross-origin request");
                return ApiError::Forbidden("origin not allowed to modify the board".to_string())
                    .into_response();
            }
        }
    }
    next.run(request).await
}
