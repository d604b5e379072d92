use crate::config::ServiceConfig;
use crate::deletion::DeletionPipeline;
use async_trait::async_trait;
use burrow_core::{
    FullUrl, ShortUrl, Shortened, ShortenId, Shortener, ShortenerError, Storage, StorageError,
    UserId, UserUrl,
};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, trace};

/// A concrete implementation of the `Shortener` trait.
///
/// Wraps a [`Storage`] backend and handles:
/// - URL validation
/// - translating a duplicate URL into [`Shortened::Existing`]
/// - per-operation deadlines
/// - batched deletion through a [`DeletionPipeline`]
///
/// Must be created inside a Tokio runtime, since it spawns the pipeline.
#[derive(Debug)]
pub struct ShortenerService<S> {
    storage: Arc<S>,
    config: ServiceConfig,
    pipeline: DeletionPipeline,
}

impl<S: Storage> ShortenerService<S> {
    pub fn new(storage: Arc<S>, config: ServiceConfig) -> Self {
        let pipeline = DeletionPipeline::spawn(Arc::clone(&storage), &config);
        Self {
            storage,
            config,
            pipeline,
        }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Drains the deletion pipeline. Deletions submitted afterwards fail with
    /// [`ShortenerError::PipelineClosed`].
    pub async fn shutdown(&self) {
        self.pipeline.shutdown().await;
    }

    /// Full URLs are opaque: surrounding whitespace is dropped, and only an
    /// empty URL is rejected.
    fn normalize_url(full_url: FullUrl) -> Result<FullUrl, ShortenerError> {
        let trimmed = full_url.as_str().trim();
        if trimmed.is_empty() {
            return Err(ShortenerError::InvalidUrl(
                "URL cannot be empty".to_string(),
            ));
        }
        if trimmed.len() == full_url.as_str().len() {
            return Ok(full_url);
        }
        Ok(FullUrl::new(trimmed))
    }

    fn short_url(&self, id: &ShortenId) -> ShortUrl {
        ShortUrl::new(id.to_url(&self.config.base_url))
    }

    async fn with_deadline<T, F>(&self, operation: &str, fut: F) -> Result<T, ShortenerError>
    where
        F: Future<Output = Result<T, ShortenerError>>,
    {
        tokio::time::timeout(self.config.operation_timeout, fut)
            .await
            .map_err(|_| ShortenerError::Timeout(operation.to_string()))?
    }
}

#[async_trait]
impl<S: Storage> Shortener for ShortenerService<S> {
    async fn create_shorten_url(
        &self,
        full_url: FullUrl,
        owner: &UserId,
    ) -> Result<Shortened, ShortenerError> {
        trace!(url = %full_url, "shortening url");
        let full_url = Self::normalize_url(full_url)?;

        self.with_deadline("create_shorten_url", async {
            match self.storage.set(full_url, owner).await {
                Ok(id) => {
                    debug!(code = %id, "created short url");
                    Ok(Shortened::Created(self.short_url(&id)))
                }
                Err(StorageError::Conflict { existing, .. }) => {
                    debug!(code = %existing, "url already shortened");
                    Ok(Shortened::Existing(self.short_url(&existing)))
                }
                Err(err) => Err(err.into()),
            }
        })
        .await
    }

    async fn get_full_url(&self, id: &ShortenId) -> Result<Option<FullUrl>, ShortenerError> {
        trace!(code = %id, "resolving short url");

        self.with_deadline("get_full_url", async {
            self.storage.get(id).await.map_err(ShortenerError::from)
        })
        .await
    }

    async fn get_all_urls(&self, owner: &UserId) -> Result<Vec<UserUrl>, ShortenerError> {
        let stored = self
            .with_deadline("get_all_urls", async {
                self.storage
                    .list_urls(owner)
                    .await
                    .map_err(ShortenerError::from)
            })
            .await?;

        Ok(stored
            .into_iter()
            .map(|url| UserUrl {
                short_url: self.short_url(&url.shorten_id),
                original_url: url.full_url,
            })
            .collect())
    }

    async fn delete_urls(&self, ids: Vec<ShortenId>, owner: &UserId) -> Result<(), ShortenerError> {
        if ids.is_empty() {
            return Ok(());
        }
        if self.pipeline.is_closed() {
            return Err(ShortenerError::PipelineClosed);
        }

        let owned: HashSet<ShortenId> = self
            .with_deadline("delete_urls", async {
                self.storage
                    .list_urls(owner)
                    .await
                    .map_err(ShortenerError::from)
            })
            .await?
            .into_iter()
            .filter(|url| !url.is_deleted)
            .map(|url| url.shorten_id)
            .collect();

        let requested = ids.len();
        let accepted: Vec<ShortenId> = ids.into_iter().filter(|id| owned.contains(id)).collect();
        debug!(
            user = %owner,
            requested,
            accepted = accepted.len(),
            "queueing urls for deletion"
        );

        if accepted.is_empty() {
            return Ok(());
        }

        self.with_deadline("delete_urls", self.pipeline.submit(accepted))
            .await
    }

    async fn ping(&self) -> Result<(), ShortenerError> {
        self.with_deadline("ping", async {
            self.storage.ping().await.map_err(ShortenerError::from)
        })
        .await
    }
}
