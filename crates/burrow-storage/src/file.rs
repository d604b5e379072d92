use async_trait::async_trait;
use burrow_core::storage::Result;
use burrow_core::{FullUrl, ShortenId, Storage, StorageError, StoredUrl, UserId};
use burrow_generator::{Generator, RandomGenerator};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, trace};
use uuid::Uuid;

/// One line of the storage file.
///
/// Entries are never rewritten. A deletion appends a copy of the entry with
/// `is_deleted` set, and the last entry for a shorten id wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: Uuid,
    pub shorten_id: ShortenId,
    pub full_url: FullUrl,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl FileEntry {
    fn new(shorten_id: ShortenId, full_url: FullUrl, owner: &UserId) -> Self {
        Self {
            id: Uuid::new_v4(),
            shorten_id,
            full_url,
            user_id: Some(owner.clone()),
            created_at: Some(Timestamp::now()),
            is_deleted: false,
        }
    }

    fn tombstone(&self) -> Self {
        Self {
            is_deleted: true,
            ..self.clone()
        }
    }

    fn to_stored(&self) -> StoredUrl {
        StoredUrl {
            shorten_id: self.shorten_id.clone(),
            full_url: self.full_url.clone(),
            is_deleted: self.is_deleted,
        }
    }
}

/// Append-only JSON-lines storage.
///
/// Every read scans the whole file, so this backend suits local development
/// and small deployments. Writers are serialized by an async mutex and each
/// append is a single write; readers never take the lock.
#[derive(Debug)]
pub struct FileStorage<G = RandomGenerator> {
    path: PathBuf,
    write_lock: Mutex<()>,
    generator: G,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_generator(path, RandomGenerator::default())
    }
}

impl<G: Generator> FileStorage<G> {
    pub fn with_generator(path: impl Into<PathBuf>, generator: G) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            generator,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every line of the file in order. A missing file reads as empty.
    async fn read_entries(&self) -> Result<Vec<FileEntry>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StorageError::io("read storage file", err)),
        };

        contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line).map_err(|e| {
                    StorageError::InvalidData(format!(
                        "{} line {}: {e}",
                        self.path.display(),
                        index + 1
                    ))
                })
            })
            .collect()
    }

    /// Folds the log into the current state of each shorten id, in order of
    /// first appearance.
    async fn current_entries(&self) -> Result<Vec<FileEntry>> {
        Ok(fold_latest(self.read_entries().await?))
    }

    async fn append(&self, entries: &[FileEntry]) -> Result<()> {
        let mut buffer = Vec::new();
        for entry in entries {
            serde_json::to_writer(&mut buffer, entry)
                .map_err(|e| StorageError::InvalidData(format!("encode entry: {e}")))?;
            buffer.push(b'\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StorageError::io("open storage file", e))?;

        file.write_all(&buffer)
            .await
            .map_err(|e| StorageError::io("append to storage file", e))?;
        file.flush()
            .await
            .map_err(|e| StorageError::io("flush storage file", e))?;

        Ok(())
    }
}

fn fold_latest(entries: Vec<FileEntry>) -> Vec<FileEntry> {
    let mut positions: HashMap<ShortenId, usize> = HashMap::new();
    let mut latest: Vec<FileEntry> = Vec::new();

    for entry in entries {
        match positions.get(&entry.shorten_id) {
            Some(&index) => latest[index] = entry,
            None => {
                positions.insert(entry.shorten_id.clone(), latest.len());
                latest.push(entry);
            }
        }
    }

    latest
}

#[async_trait]
impl<G: Generator> Storage for FileStorage<G> {
    async fn get(&self, id: &ShortenId) -> Result<Option<FullUrl>> {
        trace!(code = %id, "scanning storage file");

        let entry = self
            .current_entries()
            .await?
            .into_iter()
            .find(|entry| entry.shorten_id == *id);

        match entry {
            None => Ok(None),
            Some(entry) if entry.is_deleted => Err(StorageError::Gone(id.clone())),
            Some(entry) => Ok(Some(entry.full_url)),
        }
    }

    async fn set(&self, full_url: FullUrl, owner: &UserId) -> Result<ShortenId> {
        let _guard = self.write_lock.lock().await;

        let id: ShortenId = self.generator.generate().into();
        let entries = self.current_entries().await?;

        if let Some(existing) = entries.iter().find(|entry| entry.full_url == full_url) {
            return Err(StorageError::Conflict {
                full_url,
                existing: existing.shorten_id.clone(),
            });
        }
        if entries.iter().any(|entry| entry.shorten_id == id) {
            return Err(StorageError::IdCollision(id));
        }

        self.append(&[FileEntry::new(id.clone(), full_url, owner)])
            .await?;

        debug!(code = %id, path = %self.path.display(), "appended url to storage file");
        Ok(id)
    }

    async fn list_urls(&self, owner: &UserId) -> Result<Vec<StoredUrl>> {
        let owned = self
            .current_entries()
            .await?
            .iter()
            .filter(|entry| entry.user_id.as_ref() == Some(owner))
            .map(FileEntry::to_stored)
            .collect();

        Ok(owned)
    }

    async fn mark_as_deleted_by_id(&self, ids: &[ShortenId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;

        let tombstones: Vec<FileEntry> = self
            .current_entries()
            .await?
            .iter()
            .filter(|entry| !entry.is_deleted && ids.contains(&entry.shorten_id))
            .map(FileEntry::tombstone)
            .collect();

        if tombstones.is_empty() {
            return Ok(());
        }

        self.append(&tombstones).await?;

        debug!(
            requested = ids.len(),
            marked = tombstones.len(),
            "appended tombstones to storage file"
        );
        Ok(())
    }

    async fn bootstrap(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io("create storage directory", e))?;
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StorageError::io("create storage file", e))?;

        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        match fs::metadata(&self.path).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::io("stat storage file", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests;
    use burrow_generator::SeqGenerator;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> FileStorage {
        FileStorage::new(dir.path().join("storage.json"))
    }

    macro_rules! shared {
        ($($name:ident),* $(,)?) => {
            $(
                #[tokio::test]
                async fn $name() {
                    let dir = tempfile::tempdir().unwrap();
                    tests::$name(&store_in(&dir)).await;
                }
            )*
        };
    }

    shared!(
        set_then_get,
        get_missing,
        set_conflict_carries_existing_id,
        distinct_urls_get_distinct_ids,
        mark_as_deleted_makes_gone,
        mark_as_deleted_is_idempotent,
        mark_as_deleted_ignores_unknown_ids,
        mark_as_deleted_handles_batches,
        list_urls_scoped_by_owner,
        list_urls_includes_deleted,
        lifecycle_hooks,
    );

    #[tokio::test]
    async fn records_survive_a_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let owner = UserId::new("alice");

        let id = store_in(&dir)
            .set(FullUrl::new("https://ya.ru"), &owner)
            .await
            .unwrap();

        let reopened = store_in(&dir);
        assert_eq!(
            reopened.get(&id).await.unwrap(),
            Some(FullUrl::new("https://ya.ru"))
        );
        assert_eq!(reopened.list_urls(&owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deletion_appends_a_tombstone_line() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let owner = UserId::new("alice");

        let id = store
            .set(FullUrl::new("https://ya.ru"), &owner)
            .await
            .unwrap();
        store.mark_as_deleted_by_id(&[id.clone()]).await.unwrap();
        // already deleted: nothing more is written
        store.mark_as_deleted_by_id(&[id.clone()]).await.unwrap();

        let contents = std::fs::read_to_string(store.path()).unwrap();
        let lines: Vec<FileEntry> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert!(!lines[0].is_deleted);
        assert!(lines[1].is_deleted);
        assert_eq!(lines[0].id, lines[1].id);
        assert_eq!(lines[1].shorten_id, id);
    }

    #[tokio::test]
    async fn reads_entries_without_owner_or_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(
            &path,
            concat!(
                r#"{"id":"1b4e28ba-2fa1-11d2-883f-0016d3cca427","shorten_id":"AbC12XyZ","full_url":"https://ya.ru"}"#,
                "\n\n",
            ),
        )
        .unwrap();

        let store = FileStorage::new(&path);
        let id = ShortenId::new_unchecked("AbC12XyZ");

        assert_eq!(
            store.get(&id).await.unwrap(),
            Some(FullUrl::new("https://ya.ru"))
        );
        assert!(store
            .list_urls(&UserId::new("alice"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn malformed_line_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "not json\n").unwrap();

        let err = FileStorage::new(&path)
            .get(&ShortenId::new_unchecked("AbC12XyZ"))
            .await
            .unwrap_err();

        match err {
            StorageError::InvalidData(message) => assert!(message.contains("line 1")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert_eq!(
            store.get(&ShortenId::new_unchecked("AbC12XyZ")).await.unwrap(),
            None
        );
        assert!(store
            .list_urls(&UserId::new("alice"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn bootstrap_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("storage.json");
        let store = FileStorage::new(&path);

        store.bootstrap().await.unwrap();

        assert!(path.exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[tokio::test]
    async fn list_urls_in_creation_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStorage::with_generator(
            dir.path().join("storage.json"),
            SeqGenerator::with_prefix("bw"),
        );
        let owner = UserId::new("alice");

        for i in 0..3 {
            store
                .set(FullUrl::new(format!("https://example.com/{i}")), &owner)
                .await
                .unwrap();
        }
        store
            .mark_as_deleted_by_id(&[ShortenId::new_unchecked("bw000000")])
            .await
            .unwrap();

        let listed = store.list_urls(&owner).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|u| u.shorten_id.as_str()).collect();
        assert_eq!(ids, ["bw000000", "bw000001", "bw000002"]);
        assert!(listed[0].is_deleted);
    }

    #[tokio::test]
    async fn generated_id_collision_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let owner = UserId::new("alice");

        FileStorage::with_generator(&path, SeqGenerator::with_prefix("bw"))
            .set(FullUrl::new("https://one.example"), &owner)
            .await
            .unwrap();

        let err = FileStorage::with_generator(&path, SeqGenerator::with_prefix("bw"))
            .set(FullUrl::new("https://two.example"), &owner)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::IdCollision(ref id) if id.as_str() == "bw000000"));
    }

    #[tokio::test]
    async fn concurrent_writers_never_duplicate_a_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(store_in(&dir));
        let mut handles = vec![];

        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let owner = UserId::new(format!("user-{i}"));
                store.set(FullUrl::new("https://ya.ru"), &owner).await
            }));
        }

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(StorageError::Conflict { .. }) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(created, 1);
        let lines = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(lines.lines().count(), 1);
    }
}
