use crate::Generator;
use burrow_core::{ShortenId, SHORTEN_ID_LEN};
use jiff::Timestamp;
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, TypedBuilder)]
pub struct RandomGeneratorSettings {
    /// Number of characters per id.
    #[builder(default = SHORTEN_ID_LEN)]
    length: usize,
    /// Fixed seed; defaults to the current time in nanoseconds.
    #[builder(default, setter(strip_option))]
    seed: Option<u64>,
}

impl Default for RandomGeneratorSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Draws every character independently and uniformly from `[A-Za-z0-9]`.
///
/// Not cryptographically secure.
#[derive(Debug)]
pub struct RandomGenerator {
    rng: Mutex<StdRng>,
    length: usize,
}

impl RandomGenerator {
    pub fn new(settings: RandomGeneratorSettings) -> Self {
        let seed = settings.seed.unwrap_or_else(time_seed);
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            length: settings.length,
        }
    }

    /// Returns `length` random alphanumeric characters.
    pub fn generate_chars(&self, length: usize) -> String {
        let mut rng = self.rng.lock();
        (0..length)
            .map(|_| char::from(rng.sample(Alphanumeric)))
            .collect()
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new(RandomGeneratorSettings::default())
    }
}

fn time_seed() -> u64 {
    // truncation keeps the fast-moving low bits
    Timestamp::now().as_nanosecond() as u64
}

impl Generator for RandomGenerator {
    type Output = ShortenId;

    fn generate(&self) -> Self::Output {
        ShortenId::new_unchecked(self.generate_chars(self.length))
    }
}
