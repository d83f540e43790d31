use axum::{
    extract::rejection::JsonRejection,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use crate::api::types::{ErrorReply, SearchReply};
use crate::error::MaildexError;
use crate::models::{IndexRequest, SearchRequest};

use super::router::AppState;

/// Error wrapper for API handlers
pub enum ApiError {
    Engine(MaildexError),
    BadRequest(String),
}

impl From<MaildexError> for ApiError {
    fn from(e: MaildexError) -> Self {
        ApiError::Engine(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            ApiError::Engine(e) => {
                let status = match &e {
                    MaildexError::InvalidArgument(_) | MaildexError::NotFound(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string(), e.code())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, -22),
        };

        error!(code, "request failed: {}", message);
        (status, Json(ErrorReply::new(message, code))).into_response()
    }
}

/// Liveness probe
pub async fn ping() -> impl IntoResponse {
    StatusCode::OK
}

/// Full-range compaction of both column families
pub async fn compact(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let start = Instant::now();
    state.engine.compact()?;
    state.metrics.compactions_total.inc();
    info!(duration_ms = start.elapsed().as_millis() as u64, "compaction completed");
    Ok(StatusCode::OK)
}

/// Ingest a batch of documents into a mailbox
pub async fn index(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IndexRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let start = Instant::now();

    let indexed = state.engine.index(&req).map_err(|e| {
        state.metrics.index_errors.inc();
        e
    })?;

    state
        .metrics
        .record_index(indexed, start.elapsed().as_secs_f64());
    info!(
        mailbox = %req.mailbox,
        docs = indexed,
        duration_ms = start.elapsed().as_millis() as u64,
        "index request completed"
    );
    Ok(StatusCode::OK)
}

/// Intersection search across mailboxes
pub async fn search(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let start = Instant::now();

    let result = state.engine.search(&req).map_err(|e| {
        state.metrics.search_errors.inc();
        e
    })?;

    state.metrics.record_search(start.elapsed().as_secs_f64());
    info!(
        mailboxes = req.request.len(),
        docs = result.docs.len(),
        completed = result.completed,
        next_document_id = %result.next_document_id,
        duration_ms = start.elapsed().as_millis() as u64,
        "search request completed"
    );
    Ok(Json(SearchReply::from(result)))
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = state.metrics.registry().gather();
    let mut buffer = vec![];
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| ApiError::Engine(MaildexError::Internal(e.to_string())))?;

    Ok((
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        buffer,
    ))
}
