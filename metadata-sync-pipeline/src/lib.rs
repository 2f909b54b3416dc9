//! # Metadata Sync Pipeline
//!
//! This crate reconciles change rows from the object store with documents
//! in the search index.
//!
//! ## Architecture
//!
//! 1. **Runner**: pulls batches of change rows for a partition, starting at
//!    its checkpoint
//! 2. **Reconciler**: splits a batch into deletes and upserts, resolves
//!    which upserts are stale, fetches their metadata and submits the bulk
//!    writes
//! 3. **Builder**: turns object metadata into index documents
//! 4. **Checkpoint**: records the last committed row per partition
//!
//! `schema::ensure_mapping` is run once at startup, before any batch.

pub mod builder;
pub mod checkpoint;
pub mod errors;
pub mod fetcher;
pub mod reconciler;
pub mod runner;
pub mod schema;
pub mod staleness;

#[cfg(test)]
mod test_support;

pub use builder::DocumentBuilder;
pub use checkpoint::{CheckpointEntry, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use errors::{CheckpointError, DocumentBuildError, EntryFailure, Operation, SyncError};
pub use fetcher::{FetchError, MetadataFetcher};
pub use reconciler::{BatchHandler, BatchReconciler, ReconcilerConfig};
pub use runner::{ChangeFeed, PartitionRunner};
pub use schema::{ensure_mapping, MappingReport};
pub use staleness::{StalenessResolver, StalenessReport};
