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
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use loadsentry_core::Verdict;
use serde::Serialize;

use crate::api::AppState;

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub analysis: Verdict,
}

/// GET /analyze - Latest verdict, or `no data` before the first sample
pub async fn latest(State(state): State<AppState>) -> Response {
    let verdict = state.analyzer.snapshot();
    if !verdict.has_data() {
        return "no data".into_response();
    }
    Json(AnalyzeResponse { analysis: verdict }).into_response()
}
