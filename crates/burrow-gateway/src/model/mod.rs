mod url;

pub use url::{BatchItemRequest, BatchItemResponse, HealthResponse, ShortenRequest, ShortenResponse};
