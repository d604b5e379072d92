use crate::error::Result;
use crate::model::HealthResponse;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Checks that the storage backend is reachable.
pub async fn ping_handler(State(state): State<AppState>) -> Result<StatusCode> {
    state.shortener().ping().await?;
    Ok(StatusCode::OK)
}
