//! # Metadata Sync
//!
//! Service wiring for the metadata sync: settings, tracing, the object-store
//! metadata fetcher, and the startup sequence that verifies the index
//! mapping before any batch is reconciled.
//!
//! The change feed is provided by the host; [`Dependencies::new`] takes it
//! and returns a runner ready to drain partitions.

pub mod config;
pub mod swift;
pub mod telemetry;

pub use config::{Dependencies, SyncSettings};
pub use swift::SwiftMetadataFetcher;

use thiserror::Error;

/// Errors that can occur during service initialization or execution.
#[derive(Error, Debug)]
pub enum SyncServiceError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Sync pipeline error.
    #[error("Sync error: {0}")]
    SyncError(#[from] metadata_sync_pipeline::SyncError),

    /// Search index error.
    #[error("Search index error: {0}")]
    SearchError(#[from] metadata_sync_repository::SearchIndexError),
}

impl SyncServiceError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
