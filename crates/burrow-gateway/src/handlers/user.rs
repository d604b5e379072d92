use super::parse_json;
use crate::auth::CurrentUser;
use crate::error::Result;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use burrow_core::ShortenId;
use tracing::debug;

/// `GET /api/user/urls`: every URL the caller shortened, or 204 if none.
pub async fn list_user_urls_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response> {
    let urls = state.shortener().get_all_urls(&user).await?;

    if urls.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(urls).into_response())
}

/// `DELETE /api/user/urls` with a JSON array of shorten ids. Deletion is
/// asynchronous: 202 means the ids were queued.
pub async fn delete_user_urls_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Bytes,
) -> Result<StatusCode> {
    let raw: Vec<String> = parse_json(&body)?;
    let requested = raw.len();

    // ids that fail validation cannot exist, so they are dropped
    let ids: Vec<ShortenId> = raw
        .into_iter()
        .filter_map(|id| ShortenId::new(id).ok())
        .collect();
    debug!(requested, valid = ids.len(), "deletion request");

    state.shortener().delete_urls(ids, &user).await?;
    Ok(StatusCode::ACCEPTED)
}
