/// Health check endpoint
///
/// `GET /health` — public, no authentication. Verifies database
/// connectivity so orchestrators can gate traffic on it.

use crate::app::AppState;
use crate::error::ApiResult;
use axum::{extract::State, Json};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "ok" when the check passes
    pub status: &'static str,

    /// Server version
    pub version: &'static str,
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    teamline_shared::db::pool::health_check(&state.db).await?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    }))
}
