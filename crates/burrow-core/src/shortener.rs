use crate::shorten_id::ShortenId;
use crate::url::{FullUrl, ShortUrl};
use crate::user::UserId;
use async_trait::async_trait;
use serde::Serialize;

type Result<T> = std::result::Result<T, crate::error::ShortenerError>;

/// Outcome of shortening a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shortened {
    /// A new record was created.
    Created(ShortUrl),
    /// The URL was already shortened; this is its existing short URL.
    Existing(ShortUrl),
}

impl Shortened {
    pub fn short_url(&self) -> &ShortUrl {
        match self {
            Shortened::Created(url) | Shortened::Existing(url) => url,
        }
    }

    pub fn into_short_url(self) -> ShortUrl {
        match self {
            Shortened::Created(url) | Shortened::Existing(url) => url,
        }
    }

    pub fn is_existing(&self) -> bool {
        matches!(self, Shortened::Existing(_))
    }
}

/// A URL owned by a user, as shown to that user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserUrl {
    pub short_url: ShortUrl,
    pub original_url: FullUrl,
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Shortens `full_url` on behalf of `owner`.
    async fn create_shorten_url(&self, full_url: FullUrl, owner: &UserId) -> Result<Shortened>;

    /// Resolves a shorten id to its full URL.
    /// Returns `None` if the id does not exist and `Err(Gone)` if it was deleted.
    async fn get_full_url(&self, id: &ShortenId) -> Result<Option<FullUrl>>;

    /// Lists every URL shortened by `owner`.
    async fn get_all_urls(&self, owner: &UserId) -> Result<Vec<UserUrl>>;

    /// Schedules `ids` for deletion and returns without waiting for storage.
    async fn delete_urls(&self, ids: Vec<ShortenId>, owner: &UserId) -> Result<()>;

    /// Checks that the underlying storage is reachable.
    async fn ping(&self) -> Result<()>;
}
