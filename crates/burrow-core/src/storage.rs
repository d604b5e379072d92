use crate::error::StorageError;
use crate::shorten_id::ShortenId;
use crate::url::FullUrl;
use crate::user::UserId;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, StorageError>;

/// A stored URL record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub shorten_id: ShortenId,
    pub full_url: FullUrl,
    pub user_id: Option<UserId>,
    pub created_at: Timestamp,
    pub is_deleted: bool,
}

impl UrlRecord {
    /// Creates a live record owned by `user_id`, stamped with the current time.
    pub fn new(shorten_id: ShortenId, full_url: FullUrl, user_id: UserId) -> Self {
        Self {
            shorten_id,
            full_url,
            user_id: Some(user_id),
            created_at: Timestamp::now(),
            is_deleted: false,
        }
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        self.user_id.as_ref() == Some(user)
    }

    pub fn to_stored(&self) -> StoredUrl {
        StoredUrl {
            shorten_id: self.shorten_id.clone(),
            full_url: self.full_url.clone(),
            is_deleted: self.is_deleted,
        }
    }
}

/// One entry of a user's URL listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUrl {
    pub shorten_id: ShortenId,
    pub full_url: FullUrl,
    pub is_deleted: bool,
}

/// The storage contract shared by the memory, file and database backends.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Returns the full URL of a live record.
    ///
    /// Returns `Ok(None)` if no record exists and `Err(StorageError::Gone)`
    /// if the record has been soft-deleted.
    async fn get(&self, id: &ShortenId) -> Result<Option<FullUrl>>;

    /// Generates a new shorten id and stores `full_url` under it.
    ///
    /// Returns `Err(StorageError::Conflict)` carrying the existing shorten id
    /// if `full_url` is already stored.
    async fn set(&self, full_url: FullUrl, owner: &UserId) -> Result<ShortenId>;

    /// Lists every record owned by `owner`, deleted ones included, in
    /// creation order. An owner with no records yields an empty vector.
    async fn list_urls(&self, owner: &UserId) -> Result<Vec<StoredUrl>>;

    /// Soft-deletes every record whose shorten id is in `ids`.
    ///
    /// Unknown ids and already deleted records are ignored.
    async fn mark_as_deleted_by_id(&self, ids: &[ShortenId]) -> Result<()>;

    /// Creates whatever the backend needs before serving: tables, files.
    async fn bootstrap(&self) -> Result<()> {
        Ok(())
    }

    /// Releases external resources held by the backend.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
