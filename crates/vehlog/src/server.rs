// SPDX-FileCopyrightText: 2026 Vehlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP transport built on axum.
//!
//! Routes:
//! - `POST /events`: raw body plus sender headers, authenticated then ingested
//! - `GET /health`: database liveness

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};
use vehlog_core::VehlogError;
use vehlog_ingest::{AuthValidator, EventIngestor, HeaderSource};
use vehlog_storage::Database;
use vehlog_summarizer::TripSummarizer;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub validator: Arc<AuthValidator>,
    pub ingestor: EventIngestor,
    pub db: Database,
    /// Set when a summarization cycle should follow every stored event.
    pub after_ingest: Option<Arc<TripSummarizer>>,
}

/// Adapts axum's header map, whose name lookup ignores case.
///
/// Values go through as raw bytes; senders put UTF-8 names in them.
struct RequestHeaders<'a>(&'a HeaderMap);

impl HeaderSource for RequestHeaders<'_> {
    fn header(&self, name: &str) -> Option<&[u8]> {
        self.0.get(name).map(|v| v.as_bytes())
    }
}

/// Build the application router.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/events", post(post_event))
        .route("/health", get(get_health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Caller-visible status for each error category.
fn status_for(err: &VehlogError) -> StatusCode {
    match err {
        VehlogError::Auth(_) => StatusCode::UNAUTHORIZED,
        VehlogError::Validation(_) => StatusCode::BAD_REQUEST,
        VehlogError::DuplicateEvent { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &VehlogError) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        error!(error = %err, "event request failed");
        (status, "internal error").into_response()
    } else {
        (status, err.to_string()).into_response()
    }
}

async fn post_event(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let headers = RequestHeaders(&headers);
    if let Err(e) = state.validator.validate_headers(&body, &headers) {
        return error_response(&e);
    }

    match state.ingestor.ingest(&body, &headers).await {
        Ok(event) => {
            if let Some(summarizer) = &state.after_ingest {
                let summarizer = Arc::clone(summarizer);
                tokio::spawn(async move {
                    if let Err(e) = summarizer.run_cycle().await {
                        warn!(error = %e, "summarization after ingest failed");
                    }
                });
            }
            debug!(tripid = %event.tripid, serial = event.serial, "event accepted");
            (StatusCode::OK, "OK").into_response()
        }
        Err(e) => error_response(&e),
    }
}

async fn get_health(State(state): State<AppState>) -> Response {
    match state.db.health_check().await {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(e) => {
            error!(error = %e, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "database unavailable").into_response()
        }
    }
}
