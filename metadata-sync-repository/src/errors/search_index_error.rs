//! Search index error types.
//!
//! This module defines the error types that can occur while talking to the
//! search index.

use thiserror::Error;

/// Errors that can occur during search index operations.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// Validation error (e.g., malformed arguments).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failed to reach the search engine, including timeouts.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The search engine answered with an unexpected status.
    #[error("Request failed with status {status}: {body}")]
    RequestError { status: u16, body: String },

    /// Failed to parse a response from the search engine.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to read or update the index mapping.
    #[error("Mapping error: {0}")]
    MappingError(String),

    /// Batch size exceeds configured maximum.
    #[error("Batch size {provided} exceeds maximum {max}")]
    BatchSizeExceeded { provided: usize, max: usize },
}

impl SearchIndexError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a request error from a status code and response body.
    pub fn request(status: u16, body: impl Into<String>) -> Self {
        Self::RequestError {
            status,
            body: body.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a mapping error.
    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::MappingError(msg.into())
    }

    /// Create a batch size exceeded error.
    pub fn batch_size_exceeded(provided: usize, max: usize) -> Self {
        Self::BatchSizeExceeded { provided, max }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionError(_) => true,
            Self::RequestError { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            Self::ValidationError(_)
            | Self::ParseError(_)
            | Self::MappingError(_)
            | Self::BatchSizeExceeded { .. } => false,
        }
    }
}
