use async_trait::async_trait;
use burrow_core::storage::Result;
use burrow_core::{FullUrl, ShortenId, Storage, StorageError, StoredUrl, UrlRecord, UserId};
use burrow_generator::{Generator, RandomGenerator};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

/// In-memory implementation of the [`Storage`] trait using DashMap.
///
/// `records` maps shorten ids to records; `by_url` indexes the same records
/// by full URL and is the arbiter of URL uniqueness. When both maps are
/// locked, `by_url` is always locked first.
#[derive(Debug)]
pub struct InMemoryStorage<G = RandomGenerator> {
    records: DashMap<ShortenId, UrlRecord>,
    by_url: DashMap<FullUrl, ShortenId>,
    generator: G,
}

impl InMemoryStorage {
    /// Creates a new in-memory storage with a time-seeded random generator.
    pub fn new() -> Self {
        Self::with_generator(RandomGenerator::default())
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Generator> InMemoryStorage<G> {
    pub fn with_generator(generator: G) -> Self {
        Self {
            records: DashMap::new(),
            by_url: DashMap::new(),
            generator,
        }
    }

    /// Number of stored records, deleted ones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl<G: Generator> Storage for InMemoryStorage<G> {
    async fn get(&self, id: &ShortenId) -> Result<Option<FullUrl>> {
        trace!(code = %id, "looking up shorten id");

        let Some(record) = self.records.get(id) else {
            return Ok(None);
        };

        if record.is_deleted {
            return Err(StorageError::Gone(id.clone()));
        }

        Ok(Some(record.full_url.clone()))
    }

    async fn set(&self, full_url: FullUrl, owner: &UserId) -> Result<ShortenId> {
        let id: ShortenId = self.generator.generate().into();

        // Holding the index entry makes check-and-insert atomic per URL, and the
        // record lands before any conflicting caller can observe the id.
        match self.by_url.entry(full_url.clone()) {
            Entry::Occupied(existing) => Err(StorageError::Conflict {
                full_url,
                existing: existing.get().clone(),
            }),
            Entry::Vacant(slot) => {
                match self.records.entry(id.clone()) {
                    Entry::Occupied(_) => return Err(StorageError::IdCollision(id)),
                    Entry::Vacant(record) => {
                        record.insert(UrlRecord::new(id.clone(), full_url, owner.clone()));
                    }
                }
                slot.insert(id.clone());
                debug!(code = %id, "stored url in memory");
                Ok(id)
            }
        }
    }

    async fn list_urls(&self, owner: &UserId) -> Result<Vec<StoredUrl>> {
        let mut owned: Vec<UrlRecord> = self
            .records
            .iter()
            .filter(|entry| entry.value().is_owned_by(owner))
            .map(|entry| entry.value().clone())
            .collect();

        owned.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.shorten_id.cmp(&b.shorten_id))
        });

        Ok(owned.iter().map(UrlRecord::to_stored).collect())
    }

    async fn mark_as_deleted_by_id(&self, ids: &[ShortenId]) -> Result<()> {
        let mut marked = 0usize;
        for id in ids {
            if let Some(mut record) = self.records.get_mut(id) {
                if !record.is_deleted {
                    record.is_deleted = true;
                    marked += 1;
                }
            }
        }

        debug!(requested = ids.len(), marked, "marked urls as deleted in memory");
        Ok(())
    }
}
