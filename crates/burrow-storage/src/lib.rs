//! Storage backends for the Burrow URL shortener.
//!
//! Every backend implements [`burrow_core::Storage`]:
//!
//! - [`InMemoryStorage`]: concurrent maps, nothing survives a restart.
//! - [`FileStorage`]: an append-only JSON-lines log, for local use.
//! - [`PostgresStorage`]: a `shortener` table with a unique index on the full URL.

pub mod file;
pub mod memory;
pub mod postgres;


pub use burrow_core::storage::Result;
pub use burrow_core::{Storage, StorageError, StoredUrl, UrlRecord};
pub use file::FileStorage;
pub use memory::InMemoryStorage;
pub use postgres::PostgresStorage;
