//! Core types and traits for the Burrow URL shortener.
//!
//! This crate provides the domain types shared by every other crate, the
//! [`Storage`] contract implemented by the backends, and the [`Shortener`]
//! contract the HTTP gateway consumes.

pub mod error;
pub mod shortener;
pub mod shorten_id;
pub mod storage;
pub mod url;
pub mod user;

pub use error::{CoreError, ShortenerError, StorageError};
pub use shorten_id::{ShortenId, SHORTEN_ID_LEN};
pub use shortener::{Shortened, Shortener, UserUrl};
pub use storage::{Storage, StoredUrl, UrlRecord};
pub use url::{FullUrl, ShortUrl};
pub use user::UserId;
