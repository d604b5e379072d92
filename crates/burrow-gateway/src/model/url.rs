use burrow_core::{FullUrl, ShortUrl};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    pub url: FullUrl,
}

#[derive(Debug, Serialize)]
pub struct ShortenResponse {
    pub result: ShortUrl,
}

#[derive(Debug, Deserialize)]
pub struct BatchItemRequest {
    pub correlation_id: String,
    pub original_url: FullUrl,
}

#[derive(Debug, Serialize)]
pub struct BatchItemResponse {
    pub correlation_id: String,
    pub short_url: ShortUrl,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
