use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Length of every generated shorten id.
pub const SHORTEN_ID_LEN: usize = 8;

/// The lookup key of a shortened URL.
///
/// Shorten ids are exactly [`SHORTEN_ID_LEN`] characters drawn from
/// `[A-Za-z0-9]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortenId(String);

impl ShortenId {
    /// Creates a new `ShortenId` after validating the input.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Creates a `ShortenId` without validation.
    ///
    /// Use this only for ids produced by trusted internal sources
    /// (generators, rows read back from storage).
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates the full short URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), CoreError> {
        if id.len() != SHORTEN_ID_LEN {
            return Err(CoreError::InvalidShortenId(format!(
                "length must be {}, got {}",
                SHORTEN_ID_LEN,
                id.len()
            )));
        }

        if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CoreError::InvalidShortenId(format!(
                "must contain only alphanumeric characters: '{}'",
                id
            )));
        }

        Ok(())
    }
}

impl Display for ShortenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
