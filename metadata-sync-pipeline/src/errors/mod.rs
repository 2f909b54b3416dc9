//! Error types for the metadata sync pipeline.

use std::fmt;

use metadata_sync_repository::SearchIndexError;
use metadata_sync_shared::{DocumentId, TimestampError};
use thiserror::Error;

/// Step of the reconciliation an entry failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Bulk delete of a removed object.
    Delete,
    /// Multi-get of the stored timestamp.
    Lookup,
    /// Metadata fetch from the object store.
    Fetch,
    /// Conversion of metadata into an index document.
    Build,
    /// Bulk index of a stale object.
    Index,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Delete => "delete",
            Self::Lookup => "lookup",
            Self::Fetch => "fetch",
            Self::Build => "build",
            Self::Index => "index",
        };
        f.write_str(name)
    }
}

/// Failure of one entry of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryFailure {
    pub operation: Operation,
    /// Document the failure relates to, when known.
    pub doc_id: Option<DocumentId>,
    pub message: String,
}

impl EntryFailure {
    pub fn new(operation: Operation, doc_id: Option<DocumentId>, message: impl Into<String>) -> Self {
        Self {
            operation,
            doc_id,
            message: message.into(),
        }
    }

    pub fn for_doc(operation: Operation, doc_id: &DocumentId, message: impl Into<String>) -> Self {
        Self::new(operation, Some(doc_id.clone()), message)
    }
}

impl fmt::Display for EntryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.doc_id {
            Some(id) => write!(f, "{} {}: {}", self.operation, id, self.message),
            None => write!(f, "{}: {}", self.operation, self.message),
        }
    }
}

/// Errors raised while turning object metadata into an index document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentBuildError {
    /// A required header is absent.
    #[error("Missing required header '{0}'")]
    MissingHeader(&'static str),

    /// The object timestamp header could not be parsed.
    #[error("Invalid object timestamp: {0}")]
    InvalidTimestamp(#[from] TimestampError),

    /// The Last-Modified header is not an RFC 2822 date.
    #[error("Invalid last-modified date '{0}'")]
    InvalidDate(String),
}

/// Errors raised by checkpoint stores.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Reading or writing the checkpoint file failed.
    #[error("Checkpoint IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The checkpoint could not be serialized.
    #[error("Checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The checkpoint lock could not be taken.
    #[error("Checkpoint lock error: {0}")]
    Lock(String),
}

/// Errors that can occur in the metadata sync pipeline.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Some entries of a batch failed. Each failure is logged where it is
    /// detected; the batch must be retried as a whole.
    #[error("Failed to process some entries")]
    PartialFailure { failures: Vec<EntryFailure> },

    /// The index mapping could not be verified or updated.
    #[error("Mapping error: {0}")]
    Mapping(#[source] SearchIndexError),

    /// Reading or writing a checkpoint failed.
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// The change feed failed to deliver a batch.
    #[error("Change feed error: {0}")]
    Feed(String),
}

impl SyncError {
    /// Create a change feed error.
    pub fn feed(msg: impl Into<String>) -> Self {
        Self::Feed(msg.into())
    }

    /// Failures carried by a partial failure; empty for other errors.
    pub fn failures(&self) -> &[EntryFailure] {
        match self {
            Self::PartialFailure { failures } => failures,
            _ => &[],
        }
    }
}
