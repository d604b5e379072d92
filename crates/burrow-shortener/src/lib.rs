//! URL shortener service implementation.
//!
//! [`ShortenerService`] implements [`burrow_core::Shortener`] over any
//! [`burrow_core::Storage`] backend and owns the background
//! [`DeletionPipeline`] that batches soft deletes.

pub mod config;
pub mod deletion;
pub mod service;

pub use burrow_core::ShortenerError;
pub use config::ServiceConfig;
pub use deletion::DeletionPipeline;
pub use service::ShortenerService;
