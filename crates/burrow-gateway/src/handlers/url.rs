use super::parse_json;
use crate::auth::CurrentUser;
use crate::error::{AppError, Result};
use crate::model::{BatchItemRequest, BatchItemResponse, ShortenRequest, ShortenResponse};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use burrow_core::{FullUrl, Shortened, ShortenId};
use tracing::debug;

fn status_of(shortened: &Shortened) -> StatusCode {
    if shortened.is_existing() {
        StatusCode::CONFLICT
    } else {
        StatusCode::CREATED
    }
}

/// `POST /` with the URL as a plain-text body.
pub async fn shorten_text_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: String,
) -> Result<Response> {
    let url = body.trim();
    if url.is_empty() {
        return Err(AppError::BadRequest("request body is empty".to_string()));
    }

    let shortened = state
        .shortener()
        .create_shorten_url(FullUrl::new(url), &user)
        .await?;

    Ok((
        status_of(&shortened),
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        shortened.into_short_url().to_string(),
    )
        .into_response())
}

/// `POST /api/shorten` with `{"url": ...}`.
pub async fn shorten_json_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Bytes,
) -> Result<(StatusCode, Json<ShortenResponse>)> {
    let request: ShortenRequest = parse_json(&body)?;

    let shortened = state
        .shortener()
        .create_shorten_url(request.url, &user)
        .await?;

    Ok((
        status_of(&shortened),
        Json(ShortenResponse {
            result: shortened.into_short_url(),
        }),
    ))
}

/// `POST /api/shorten/batch`. Answers 409 if any URL was already shortened;
/// every item still gets its short URL.
pub async fn shorten_batch_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Bytes,
) -> Result<(StatusCode, Json<Vec<BatchItemResponse>>)> {
    let items: Vec<BatchItemRequest> = parse_json(&body)?;
    if items.is_empty() {
        return Err(AppError::BadRequest("batch is empty".to_string()));
    }

    let mut status = StatusCode::CREATED;
    let mut shortened_items = Vec::with_capacity(items.len());

    for item in items {
        let shortened = state
            .shortener()
            .create_shorten_url(item.original_url, &user)
            .await?;
        if shortened.is_existing() {
            status = StatusCode::CONFLICT;
        }
        shortened_items.push(BatchItemResponse {
            correlation_id: item.correlation_id,
            short_url: shortened.into_short_url(),
        });
    }

    debug!(count = shortened_items.len(), status = %status, "shortened batch");
    Ok((status, Json(shortened_items)))
}

/// `GET /{id}`: redirects to the full URL.
pub async fn redirect_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    // an id that cannot have been generated cannot exist either
    let id = ShortenId::new(id).map_err(|_| AppError::NotFound)?;

    let full_url = state
        .shortener()
        .get_full_url(&id)
        .await?
        .ok_or(AppError::NotFound)?;

    let location = HeaderValue::from_str(full_url.as_str())
        .map_err(|e| AppError::Internal(format!("stored url is not a valid header: {e}")))?;

    Ok((StatusCode::TEMPORARY_REDIRECT, [(LOCATION, location)]).into_response())
}
