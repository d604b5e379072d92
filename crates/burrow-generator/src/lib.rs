pub mod random;
pub mod seq;

pub use random::{RandomGenerator, RandomGeneratorSettings};
pub use seq::SeqGenerator;

use burrow_core::ShortenId;

/// Trait for generating shorten ids.
///
/// Implementations are pure generators that don't interact with storage.
/// Uniqueness is not guaranteed: backends detect collisions on their own.
pub trait Generator: Send + Sync + 'static {
    type Output: Into<ShortenId>;

    fn generate(&self) -> Self::Output;
}
