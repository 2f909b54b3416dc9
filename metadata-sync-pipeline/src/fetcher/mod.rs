//! Object metadata source.
//!
//! The pipeline never talks to the object store directly; it asks a
//! `MetadataFetcher` for the current headers of an object.

use async_trait::async_trait;
use thiserror::Error;

use metadata_sync_shared::ObjectMetadata;

/// Errors returned by metadata fetchers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The object no longer exists.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// A failure that may succeed on a later attempt.
    #[error("Transient error: {0}")]
    Transient(String),

    /// The fetch did not complete within its deadline.
    #[error("Timed out after {0} ms")]
    Timeout(u64),
}

impl FetchError {
    /// Create a transient error.
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }
}

/// Source of authoritative object metadata.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// Fetch the headers of an object, with lower-cased header names.
    ///
    /// With `prefer_freshest` the object store must consult every replica
    /// and answer with the newest copy rather than the first one found.
    async fn fetch_metadata(
        &self,
        account: &str,
        container: &str,
        object: &str,
        prefer_freshest: bool,
    ) -> Result<ObjectMetadata, FetchError>;
}
