//! Configuration types for the index client.

use std::time::Duration;

/// Configuration for an index client.
#[derive(Debug, Clone)]
pub struct IndexClientConfig {
    /// Index server URL.
    pub url: String,
    /// Timeout applied to every request sent to the index.
    pub request_timeout: Duration,
    /// Maximum number of actions sent in one bulk request. Larger op lists
    /// are split into several requests.
    pub bulk_chunk_size: usize,
    /// Maximum number of actions accepted in a single `bulk_write` call.
    /// Set to None to disable the limit.
    pub max_batch_size: Option<usize>,
}

impl Default for IndexClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            request_timeout: Duration::from_secs(30),
            bulk_chunk_size: 500,
            max_batch_size: None,
        }
    }
}

impl IndexClientConfig {
    /// Create a config for the given URL with default limits.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the bulk chunk size. Zero is treated as one.
    pub fn with_bulk_chunk_size(mut self, size: usize) -> Self {
        self.bulk_chunk_size = size.max(1);
        self
    }

    /// Limit the number of actions accepted per `bulk_write` call.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = Some(max_batch_size);
        self
    }
}
