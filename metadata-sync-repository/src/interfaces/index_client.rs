//! Index client trait definition.

use async_trait::async_trait;

use crate::errors::SearchIndexError;
use crate::types::{BulkItemOutcome, BulkOperation, EngineVersion, FieldMapping, MultiGetOutcome};
use metadata_sync_shared::DocumentId;

/// Abstract interface for the index operations the sync relies on.
///
/// Implementations can be swapped for different backends (OpenSearch, mock,
/// etc.), which keeps the reconciliation logic testable without a cluster.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// Whole-request failures are reported as `Err(SearchIndexError)`. Failures
/// of individual items inside a bulk or multi-get request are reported in the
/// returned outcome lists instead.
#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Submit operations as a bulk write.
    ///
    /// Returns one outcome per operation, in submission order. A transport
    /// failure (including a timeout) is reported as an exception on each
    /// affected item rather than as an error of the whole call.
    async fn bulk_write(
        &self,
        operations: &[BulkOperation],
    ) -> Result<Vec<BulkItemOutcome>, SearchIndexError>;

    /// Look up several documents at once, returning only the requested
    /// source fields.
    ///
    /// When `refresh` is set the index is refreshed before the lookup so it
    /// observes every prior write.
    async fn multi_get(
        &self,
        index: &str,
        ids: &[DocumentId],
        fields: &[&str],
        refresh: bool,
    ) -> Result<Vec<MultiGetOutcome>, SearchIndexError>;

    /// Read the current field mapping of an index.
    ///
    /// Returns `Ok(None)` when the index (or its document type) does not exist.
    async fn get_mapping(&self, index: &str) -> Result<Option<FieldMapping>, SearchIndexError>;

    /// Add field declarations to an index mapping.
    async fn put_mapping(&self, index: &str, fields: &FieldMapping)
        -> Result<(), SearchIndexError>;

    /// Version of the engine serving the index.
    async fn engine_version(&self) -> Result<EngineVersion, SearchIndexError>;
}
