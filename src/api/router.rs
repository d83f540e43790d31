use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::engine::SearchEngine;
use crate::metrics::SearchMetrics;

use super::handlers::*;

/// Application state shared across all handlers
pub struct AppState {
    pub engine: Arc<SearchEngine>,
    pub metrics: Arc<SearchMetrics>,
}

/// Create the HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/ping", get(ping))
        .route("/compact", post(compact).put(compact))
        .route("/index", post(index).put(index))
        .route("/search", post(search).put(search))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
