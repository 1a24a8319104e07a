// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! HTTP API
//!
//! | Route          | Handler                   |
//! |----------------|---------------------------|
//! | `POST /ingest` | [`ingest::ingest_sample`] |
//! | `GET /analyze` | [`analyze::latest`]       |
//! | `GET /history` | [`history::recent`]       |
//! | `GET /health`  | [`health::health_check`]  |
//! | `GET /metrics` | [`metrics::export`]       |

pub mod analyze;
pub mod health;
pub mod history;
pub mod ingest;
pub mod metrics;

use axum::{
    http::{header, StatusCode},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use loadsentry_core::Analyzer;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::ingestion::{EnqueueError, IngestQueue};
use crate::metrics::PrometheusMetrics;
use crate::middleware::track_latency;
use crate::store::MemoryStore;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("queue full")]
    QueueFull,

    #[error("shutting down")]
    ShuttingDown,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: msg,
                    code: None,
                }),
            )
                .into_response(),
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: msg,
                    code: None,
                }),
            )
                .into_response(),
            ApiError::QueueFull => (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, "1")],
                Json(ErrorResponse {
                    error: "queue full".to_string(),
                    code: Some("QUEUE_FULL"),
                }),
            )
                .into_response(),
            ApiError::ShuttingDown => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: "shutting down".to_string(),
                    code: Some("SHUTTING_DOWN"),
                }),
            )
                .into_response(),
        }
    }
}

impl From<EnqueueError> for ApiError {
    fn from(e: EnqueueError) -> Self {
        match e {
            EnqueueError::QueueFull => ApiError::QueueFull,
            EnqueueError::Closed => ApiError::ShuttingDown,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    pub queue: IngestQueue,
    pub metrics: Arc<PrometheusMetrics>,
    /// `None` when the side store is disabled.
    pub store: Option<Arc<MemoryStore>>,
}

/// Build the HTTP router.
///
/// Requests running longer than `request_timeout` (including a client that
/// stalls while sending the body) are answered with 408. Every request,
/// timed-out ones included, is recorded in the latency histogram and logged
/// by the trace layer.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/ingest", post(ingest::ingest_sample))
        .route("/analyze", get(analyze::latest))
        .route("/history", get(history::recent))
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::export))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            track_latency,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
