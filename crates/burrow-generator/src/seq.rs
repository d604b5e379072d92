use crate::Generator;
use burrow_core::{ShortenId, SHORTEN_ID_LEN};
use std::sync::atomic::{AtomicU64, Ordering};

/// A sequential shorten id generator.
///
/// Produces `prefix` followed by a zero-padded counter, padded so that the
/// id is [`SHORTEN_ID_LEN`] characters long ("bw000000", "bw000001", ...).
/// Mostly useful in tests, where predictable ids are needed.
#[derive(Debug)]
pub struct SeqGenerator {
    counter: AtomicU64,
    prefix: String,
}

impl Clone for SeqGenerator {
    fn clone(&self) -> Self {
        Self {
            counter: AtomicU64::new(self.counter.load(Ordering::SeqCst)),
            prefix: self.prefix.clone(),
        }
    }
}

impl SeqGenerator {
    /// Creates a new sequential generator with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::with_offset(prefix, 0)
    }

    /// Creates a new sequential generator starting from a specific counter value.
    pub fn with_offset(prefix: impl Into<String>, offset: u64) -> Self {
        Self {
            counter: AtomicU64::new(offset),
            prefix: prefix.into(),
        }
    }
}

impl Generator for SeqGenerator {
    type Output = ShortenId;

    fn generate(&self) -> ShortenId {
        let count = self.counter.fetch_add(1, Ordering::SeqCst);
        let width = SHORTEN_ID_LEN.saturating_sub(self.prefix.len());
        ShortenId::new_unchecked(format!("{}{:0width$}", self.prefix, count, width = width))
    }
}
