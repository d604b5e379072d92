use crate::shorten_id::ShortenId;
use crate::url::FullUrl;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("invalid shorten id: {0}")]
    InvalidShortenId(String),
}

/// Errors returned by [`Storage`](crate::Storage) backends.
///
/// "Not found" is not an error: lookups return `Ok(None)` for absent records.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The full URL is already stored; `existing` is its shorten id.
    #[error("'{full_url}' is already saved as {existing}")]
    Conflict {
        full_url: FullUrl,
        existing: ShortenId,
    },
    /// The record exists but has been soft-deleted.
    #[error("url {0} has been deleted")]
    Gone(ShortenId),
    /// A freshly generated shorten id is already taken.
    #[error("generated shorten id {0} is already taken")]
    IdCollision(ShortenId),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("storage i/o failed: {0}")]
    Io(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
}

impl StorageError {
    /// Wraps an I/O error with the name of the failing operation.
    pub fn io(operation: &str, err: impl std::fmt::Display) -> Self {
        Self::Io(format!("{operation}: {err}"))
    }
}

/// Errors returned by the [`Shortener`](crate::Shortener) service.
#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("url has been deleted")]
    Gone,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("deletion pipeline is closed")]
    PipelineClosed,
    #[error("operation timed out: {0}")]
    Timeout(String),
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for ShortenerError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::Gone(_) => Self::Gone,
            other => Self::Storage(other),
        }
    }
}
