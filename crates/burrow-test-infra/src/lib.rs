//! Disposable infrastructure for integration tests. Needs a running Docker
//! daemon.

pub mod error;
pub mod postgres;

pub use error::{Result, TestInfraError};
