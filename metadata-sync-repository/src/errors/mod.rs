//! Error types for the metadata sync repository.

mod search_index_error;

pub use search_index_error::SearchIndexError;
