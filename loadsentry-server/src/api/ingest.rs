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

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use loadsentry_core::Sample;
use tracing::debug;

use crate::api::{ApiError, AppState};

/// POST /ingest - Queue one sample for analysis
///
/// The body is decoded by hand rather than through the `Json` extractor so
/// that every malformed payload maps to 400.
pub async fn ingest_sample(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let sample: Sample = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON: {}", e)))?;

    sample
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    state.queue.enqueue(sample)?;
    debug!(rps = sample.rps, depth = state.queue.depth(), "Sample queued");

    Ok((StatusCode::ACCEPTED, "accepted"))
}
