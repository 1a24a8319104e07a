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

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::{ApiError, AppState};
use crate::store::StoredEntry;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    /// Maximum entries to return, capped by the store's history limit
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Most recently stored entry
    pub latest: Option<StoredEntry>,
    /// Stored entries, newest first
    pub entries: Vec<StoredEntry>,
    pub history_limit: usize,
}

/// GET /history - Recent samples and verdicts held by the side store
pub async fn recent(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let store = state
        .store
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("side store disabled".to_string()))?;

    let limit = params.limit.min(store.history_limit());

    Ok(Json(HistoryResponse {
        latest: store.last_entry(),
        entries: store.recent(limit),
        history_limit: store.history_limit(),
    }))
}
