use std::time::Duration;
use typed_builder::TypedBuilder;

pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);

/// Settings for [`ShortenerService`](crate::ShortenerService).
#[derive(Debug, Clone, TypedBuilder)]
pub struct ServiceConfig {
    /// Prefix of every returned short URL, e.g. `http://localhost:8080`.
    #[builder(setter(into))]
    pub base_url: String,
    /// Deadline for each storage call made on behalf of a request, and for
    /// each deletion flush.
    #[builder(default = DEFAULT_OPERATION_TIMEOUT)]
    pub operation_timeout: Duration,
    /// How often pending deletions are written to storage.
    #[builder(default = DEFAULT_FLUSH_INTERVAL)]
    pub flush_interval: Duration,
    /// Capacity of the channel deletion requests are submitted to.
    #[builder(default = 16)]
    pub intake_capacity: usize,
    /// Capacity of the channel feeding the batch worker.
    #[builder(default = 1024)]
    pub batch_capacity: usize,
}
