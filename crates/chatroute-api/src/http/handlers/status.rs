//! Provider status endpoint.
//!
//! GET /api/v1/providers/status - Credential counts per provider.

use std::time::Instant;

use axum::Json;
use axum::extract::State;

use chatroute_types::llm::RouterStatus;

use crate::http::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/providers/status - Live/exhausted counts per provider.
pub async fn providers_status(State(state): State<AppState>) -> Json<ApiResponse<RouterStatus>> {
    let start = Instant::now();
    let request_id = uuid::Uuid::now_v7().to_string();

    let status = state.router.providers_status();
    let elapsed = start.elapsed().as_millis() as u64;

    Json(ApiResponse::success(status, request_id, elapsed))
}
