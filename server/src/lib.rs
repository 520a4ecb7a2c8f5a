use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use threadseek_core::persist::{load_index, IndexPaths};
use threadseek_core::{Config, QueryEngine, QueryOptions, Source};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_K: usize = 100;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub k: Option<usize>,
    pub min_confidence: Option<f32>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub confidence: f32,
    pub total_hits: usize,
    pub results: Vec<Source>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
    pub index_paths_root: PathBuf,
    pub admin_token: Option<String>,
}

/// JSON error body with a status code.
pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

impl From<threadseek_core::Error> for ApiError {
    fn from(err: threadseek_core::Error) -> Self {
        use threadseek_core::Error;
        let status = match &err {
            Error::IndexNotBuilt => StatusCode::SERVICE_UNAVAILABLE,
            Error::InvalidConfiguration(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(status, err.to_string())
    }
}

pub fn build_app(index_dir: String, config: Config) -> Result<Router> {
    let engine = QueryEngine::new(config)?;
    let index_paths = IndexPaths::new(&index_dir);
    if index_paths.index().exists() {
        engine.install(load_index(&index_paths)?)?;
    } else {
        tracing::warn!(index_dir = %index_dir, "no index found; serving uninitialized until reload");
    }
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    Ok(router(AppState { engine: Arc::new(engine), index_paths_root: PathBuf::from(&index_dir), admin_token }))
}

pub fn router(app_state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/index/reload", post(reload_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let options = QueryOptions { k: params.k.map(|k| k.min(MAX_K)), min_confidence: params.min_confidence };
    // scoring walks every posting of every query term; keep it off the async workers
    let engine = state.engine.clone();
    let response = tokio::task::spawn_blocking(move || engine.respond(&params.q, options))
        .await
        .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))??;
    let elapsed = start.elapsed();
    Ok(Json(SearchResponse {
        query: response.query,
        took_s: elapsed.as_secs_f64(),
        confidence: response.confidence,
        total_hits: response.sources.len(),
        results: response.sources,
    }))
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let index = state.engine.snapshot();
    if !index.is_built() {
        return Err(threadseek_core::Error::IndexNotBuilt.into());
    }
    match index.document(&doc_id) {
        Some(doc) => Ok(Json(serde_json::json!({
            "doc_id": doc.id,
            "title": doc.title,
            "url": doc.url,
            "timestamp": doc.timestamp,
            "text": doc.raw_text,
        }))),
        None => Err(ApiError(StatusCode::NOT_FOUND, format!("document `{doc_id}` not found"))),
    }
}

/// Load the index file from disk again and swap it in. In-flight queries
/// finish on the index they started with; a failed load leaves the current
/// index serving.
async fn reload_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let root = state.index_paths_root.clone();
    let loaded = tokio::task::spawn_blocking(move || load_index(&IndexPaths::new(root)))
        .await
        .map_err(|e| ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))??;
    let index = state.engine.install(loaded)?;
    Ok(Json(serde_json::json!({ "num_docs": index.len(), "num_terms": index.vocabulary().len() })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(ApiError(StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(ApiError(StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
