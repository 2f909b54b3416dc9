//! # Metadata Sync Repository
//!
//! This crate provides the interface the sync pipeline uses to talk to the
//! search index, the request and outcome types that cross it, the baseline
//! field mapping, and a concrete implementation for OpenSearch.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod mapping;
pub mod opensearch;
pub mod types;

pub use config::IndexClientConfig;
pub use errors::SearchIndexError;
pub use interfaces::IndexClient;
pub use mapping::{baseline_mapping, render_mapping, FieldType, MappingEntry};
pub use opensearch::OpenSearchClient;
pub use types::{
    BulkAction, BulkItemOutcome, BulkOperation, Distribution, EngineVersion, FieldMapping,
    MultiGetOutcome, LEGACY_DOC_TYPE,
};
