//! Prompt endpoint logic
//!
//! Validates the `query` parameter, runs it through the orchestrator and maps
//! the outcome to a JSON response. Every failure becomes an envelope of the
//! form `{"error": true, "message": "...", "details": "..."}`; the caller
//! never sees a bare error.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, instrument, warn};

use crate::error::GatewayError;
use crate::journal::Journal;
use crate::metrics::{self, ServiceMetrics};
use crate::orchestrator::Orchestrator;

/// Shared state for the prompt endpoint
#[derive(Clone)]
pub struct GatewayState {
    pub orchestrator: Arc<Orchestrator>,
    pub journal: Journal,
    pub metrics: ServiceMetrics,
}

/// Query string of `GET /`
#[derive(Debug, Deserialize)]
pub struct PromptParams {
    pub query: Option<String>,
}

/// Decrements the in-flight counter when the request finishes, however it
/// finishes.
struct InFlight(Arc<AtomicU64>);

impl InFlight {
    fn enter(counter: &Arc<AtomicU64>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// JSON error envelope for a gateway error.
pub fn error_response(err: &GatewayError) -> Response {
    let mut body = json!({
        "error": true,
        "message": err.public_message(),
    });
    if let Some(details) = err.details() {
        body["details"] = json!(details);
    }
    (err.status(), Json(body)).into_response()
}

/// Handle one prompt request end to end.
#[instrument(skip_all, fields(request_id = %request_id))]
pub async fn handle_prompt(
    state: &GatewayState,
    query: Option<String>,
    request_id: String,
) -> Response {
    let started = Instant::now();
    let _in_flight = InFlight::enter(&state.metrics.in_flight);
    state.metrics.requests_total.fetch_add(1, Ordering::Relaxed);

    state.journal.info(
        "request",
        json!({
            "request_id": request_id,
            "query": query,
        }),
    );

    let result = match query.filter(|q| !q.is_empty()) {
        Some(query) => state.orchestrator.handle(&request_id, &query).await,
        None => Err(GatewayError::MissingQuery),
    };

    let response = match result {
        Ok(completion) => {
            state.journal.info(
                "response",
                json!({
                    "request_id": request_id,
                    "attempts": completion.attempts,
                    "code_bytes": completion.response.code.len(),
                }),
            );
            (StatusCode::OK, Json(completion.response)).into_response()
        }
        Err(err) => {
            state.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
            let data = json!({
                "request_id": request_id,
                "status": err.status().as_u16(),
                "message": err.to_string(),
            });
            if err.status().is_client_error() {
                warn!(error = %err, "rejected request");
                state.journal.warn("validation_error", data);
            } else {
                error!(error = %err, "request failed");
                state.journal.error("error", data);
            }
            error_response(&err)
        }
    };

    metrics::record_request(
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}
