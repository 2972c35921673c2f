//! Axum service for the Dual-Native HTTP surface.
//!
//! Routes:
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | GET | `/resources/:id` | MR JSON with conditional-read support |
//! | GET | `/resources/:id/rendered` | markdown projection, own fingerprint |
//! | POST | `/resources/:id/blocks` | optimistic-concurrency block insertion |
//! | GET | `/resources/:id/suggest` | summary/tags (provider or heuristic) |
//! | GET | `/catalog` | resource listing, most-recently-modified first |
//!
//! Every successful response additionally carries a `Content-Digest` header
//! over its exact bytes (see [`digest`]).

pub mod digest;
mod handlers;
#[cfg(test)]
mod tests;

use crate::conditional;
use crate::error::DualNativeError;
use crate::store::DocumentStore;
use crate::suggest::{SuggestConfig, Suggester};
use axum::http::{header, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Base URL used to derive the `links` section of every MR.
    pub base_url: String,
    /// Summarization provider settings.
    pub suggest: SuggestConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            base_url: "http://localhost:8787".to_string(),
            suggest: SuggestConfig::default(),
        }
    }
}

/// Ordered transform applied to the MR JSON after building, before hashing
/// and serving.
pub type MrTransform = Arc<dyn Fn(Value) -> Value + Send + Sync>;
/// Ordered transform applied to the rendered projection before hashing and
/// serving.
pub type RenderTransform = Arc<dyn Fn(String) -> String + Send + Sync>;

/// Explicit extension points, applied at documented pipeline stages in
/// registration order. Replaces ambient filter dispatch.
#[derive(Default)]
pub struct Extensions {
    /// Post-build transforms over the MR JSON value.
    pub mr_transforms: Vec<MrTransform>,
    /// Keys excluded from fingerprinting in addition to the defaults.
    pub extra_exclude_keys: Vec<String>,
    /// Pre-serve transforms over the rendered markdown.
    pub render_transforms: Vec<RenderTransform>,
}

/// Lazily-populated cache of content fingerprints, one entry per resource.
///
/// Invalidated atomically with the mutation it follows; recomputing and
/// storing the same value twice is harmless.
#[derive(Default)]
pub struct CidCache {
    inner: Mutex<HashMap<u64, String>>,
}

impl CidCache {
    #[must_use]
    pub fn get(&self, rid: u64) -> Option<String> {
        self.inner.lock().get(&rid).cloned()
    }

    pub fn put(&self, rid: u64, cid: String) {
        self.inner.lock().insert(rid, cid);
    }

    pub fn invalidate(&self, rid: u64) {
        self.inner.lock().remove(&rid);
    }
}

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub cids: Arc<CidCache>,
    pub extensions: Arc<Extensions>,
    pub suggester: Arc<Suggester>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, config: ServerConfig, extensions: Extensions) -> Self {
        let suggester = Arc::new(Suggester::from_config(&config.suggest));
        AppState {
            store,
            cids: Arc::new(CidCache::default()),
            extensions: Arc::new(extensions),
            suggester,
            config: Arc::new(config),
        }
    }
}

/// Build the Dual-Native service with default extensions.
#[must_use]
pub fn service(store: Arc<dyn DocumentStore>, config: ServerConfig) -> Router {
    router(AppState::new(store, config, Extensions::default()))
}

/// Build the router over prepared state.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/resources/:id", get(handlers::get_mr))
        .route("/resources/:id/rendered", get(handlers::get_rendered))
        .route("/resources/:id/blocks", post(handlers::insert_blocks))
        .route("/resources/:id/suggest", get(handlers::get_suggest))
        .route("/catalog", get(handlers::get_catalog))
        .layer(middleware::from_fn(digest::content_digest_layer))
        .with_state(state)
}

impl IntoResponse for DualNativeError {
    fn into_response(self) -> Response {
        let status = match &self {
            DualNativeError::NotFound => StatusCode::NOT_FOUND,
            DualNativeError::InvalidPayload(_) | DualNativeError::MissingBlock => {
                StatusCode::BAD_REQUEST
            }
            DualNativeError::UnsupportedBlock(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DualNativeError::PreconditionFailed { .. } => StatusCode::PRECONDITION_FAILED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        let mut response = (status, body).into_response();
        // A stale writer gets the current fingerprint so it can re-sync.
        if let DualNativeError::PreconditionFailed { current } = &self {
            if let Ok(value) = conditional::format_etag(current).parse() {
                response.headers_mut().insert(header::ETAG, value);
            }
        }
        response
    }
}
