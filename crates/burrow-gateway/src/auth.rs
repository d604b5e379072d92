//! Cookie-based user identity.
//!
//! Every user is identified by a signed HS256 token carrying its [`UserId`].
//! The token travels in the `token` cookie, or in the `Authorization` header
//! for clients without a cookie jar.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use burrow_core::UserId;
use jiff::{SignedDuration, Timestamp};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppError;
use crate::state::AppState;

pub const TOKEN_COOKIE: &str = "token";

/// How long an issued token stays valid.
pub const TOKEN_TTL: SignedDuration = SignedDuration::from_hours(24 * 30);

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub exp: i64,
}

/// Issues and validates user tokens.
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: SignedDuration,
}

impl TokenSigner {
    pub fn new(secret: &str) -> Self {
        Self::with_ttl(secret, TOKEN_TTL)
    }

    pub fn with_ttl(secret: &str, ttl: SignedDuration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user: &UserId) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            user_id: user.to_string(),
            exp: (Timestamp::now() + self.ttl).as_second(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
    }

    pub fn verify(&self, token: &str) -> Result<UserId, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())?;
        Ok(UserId::new(data.claims.user_id))
    }
}

/// The user a request was made by. Inserted by the auth middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no user identity".to_string()))
    }
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Returns the token a request carries: the cookie first, then the header.
pub fn request_token(headers: &HeaderMap) -> Option<String> {
    cookie_token(headers).or_else(|| header_token(headers))
}

fn verify(state: &AppState, token: &str) -> Result<UserId, AppError> {
    state.signer().verify(token).map_err(|e| {
        debug!(error = %e, "rejected user token");
        AppError::Unauthorized("invalid token".to_string())
    })
}

/// Identifies the caller, issuing a fresh identity to first-time callers.
///
/// A request without a token gets a new user and a `Set-Cookie` for it. A
/// request with an invalid token is rejected.
pub async fn identify(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(token) = request_token(request.headers()) {
        let user = verify(&state, &token)?;
        request.extensions_mut().insert(CurrentUser(user));
        return Ok(next.run(request).await);
    }

    let user = UserId::generate();
    let token = state
        .signer()
        .issue(&user)
        .map_err(|e| AppError::Internal(format!("sign user token: {e}")))?;
    let cookie = HeaderValue::from_str(&format!(
        "{TOKEN_COOKIE}={token}; Path=/; HttpOnly; Secure"
    ))
    .map_err(|e| AppError::Internal(format!("encode user cookie: {e}")))?;
    let authorization = HeaderValue::from_str(&token)
        .map_err(|e| AppError::Internal(format!("encode user token: {e}")))?;

    debug!(user = %user, "issued new user identity");
    request.extensions_mut().insert(CurrentUser(user));

    let mut response = next.run(request).await;
    response.headers_mut().append(SET_COOKIE, cookie);
    response.headers_mut().insert(AUTHORIZATION, authorization);
    Ok(response)
}

/// Like [`identify`], but a request without a token is rejected instead of
/// getting a fresh identity: a new user cannot own anything yet.
pub async fn require_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("missing token".to_string()))?;
    let user = verify(&state, &token)?;

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}
