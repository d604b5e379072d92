use async_trait::async_trait;
use burrow_core::storage::Result;
use burrow_core::{FullUrl, ShortenId, Storage, StorageError, StoredUrl, UserId};
use burrow_generator::{Generator, RandomGenerator};
use sqlx::{PgPool, Row};
use tracing::{debug, trace};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS shortener (
    id uuid DEFAULT gen_random_uuid() PRIMARY KEY,
    user_id uuid,
    full_url VARCHAR(2048) NOT NULL CHECK (full_url <> ''),
    shorten_id VARCHAR(8) NOT NULL CHECK (shorten_id <> ''),
    created_at TIMESTAMP WITH TIME ZONE DEFAULT CURRENT_TIMESTAMP,
    is_deleted BOOLEAN DEFAULT false
)
"#;

const CREATE_SHORTEN_ID_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS shortener_short_url_idx ON shortener (shorten_id)";

const CREATE_FULL_URL_INDEX: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS shortener_full_url_unique_idx ON shortener (full_url)";

/// PostgreSQL implementation of the storage contract.
///
/// URL uniqueness is enforced by the unique index on `full_url`: inserts
/// upsert on it and report the winning row's shorten id. Deletion only flips
/// `is_deleted`, so a deleted URL keeps its row and its shorten id.
#[derive(Debug, Clone)]
pub struct PostgresStorage<G = RandomGenerator> {
    pool: PgPool,
    generator: G,
}

impl PostgresStorage {
    /// Creates a storage from an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self::with_generator(pool, RandomGenerator::default())
    }

    /// Creates a storage by opening a new connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }
}

impl<G: Generator> PostgresStorage<G> {
    pub fn with_generator(pool: PgPool, generator: G) -> Self {
        Self { pool, generator }
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StorageError {
    let message = format!("{operation}: {err}");

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl<G: Generator> Storage for PostgresStorage<G> {
    async fn get(&self, id: &ShortenId) -> Result<Option<FullUrl>> {
        trace!(code = %id, "querying shortener table");

        let row = sqlx::query(
            r#"
            SELECT full_url, is_deleted
            FROM shortener
            WHERE shorten_id = $1
            LIMIT 1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let full_url: String = row.try_get("full_url").map_err(|e| map_sqlx_error("get", e))?;
        let is_deleted: Option<bool> =
            row.try_get("is_deleted").map_err(|e| map_sqlx_error("get", e))?;

        if is_deleted.unwrap_or(false) {
            return Err(StorageError::Gone(id.clone()));
        }

        Ok(Some(FullUrl::new(full_url)))
    }

    async fn set(&self, full_url: FullUrl, owner: &UserId) -> Result<ShortenId> {
        let owner_id = owner
            .as_uuid()
            .ok_or_else(|| StorageError::InvalidData(format!("set: owner '{owner}' is not a uuid")))?;
        let candidate: ShortenId = self.generator.generate().into();

        let returned: String = sqlx::query_scalar(
            r#"
            INSERT INTO shortener (user_id, full_url, shorten_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (full_url) DO UPDATE
                SET full_url = EXCLUDED.full_url
            RETURNING shorten_id
            "#,
        )
        .bind(owner_id)
        .bind(full_url.as_str())
        .bind(candidate.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("set", e))?;

        if returned != candidate.as_str() {
            return Err(StorageError::Conflict {
                full_url,
                existing: ShortenId::new_unchecked(returned),
            });
        }

        debug!(code = %candidate, "inserted url row");
        Ok(candidate)
    }

    async fn list_urls(&self, owner: &UserId) -> Result<Vec<StoredUrl>> {
        // owners are stored as uuid, so nothing else can own a row
        let Some(owner_id) = owner.as_uuid() else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            r#"
            SELECT shorten_id, full_url, is_deleted
            FROM shortener
            WHERE user_id = $1
            ORDER BY created_at, shorten_id
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_urls", e))?;

        rows.iter()
            .map(|row| -> std::result::Result<StoredUrl, sqlx::Error> {
                let shorten_id: String = row.try_get("shorten_id")?;
                let full_url: String = row.try_get("full_url")?;
                let is_deleted: Option<bool> = row.try_get("is_deleted")?;
                Ok(StoredUrl {
                    shorten_id: ShortenId::new_unchecked(shorten_id),
                    full_url: FullUrl::new(full_url),
                    is_deleted: is_deleted.unwrap_or(false),
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("list_urls", e))
    }

    async fn mark_as_deleted_by_id(&self, ids: &[ShortenId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = ids.iter().map(|id| id.as_str().to_owned()).collect();

        let result = sqlx::query(
            r#"
            UPDATE shortener
            SET is_deleted = true
            WHERE shorten_id = ANY($1)
              AND is_deleted IS NOT TRUE
            "#,
        )
        .bind(&ids)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_as_deleted_by_id", e))?;

        debug!(
            requested = ids.len(),
            marked = result.rows_affected(),
            "marked url rows as deleted"
        );
        Ok(())
    }

    async fn bootstrap(&self) -> Result<()> {
        for statement in [CREATE_TABLE, CREATE_SHORTEN_ID_INDEX, CREATE_FULL_URL_INDEX] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("bootstrap", e))?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;
        Ok(())
    }
}
