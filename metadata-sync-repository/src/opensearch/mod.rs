//! OpenSearch implementation of the index client.
//!
//! This module provides a concrete implementation of `IndexClient` using
//! OpenSearch (or a wire-compatible Elasticsearch) as the backend.

mod client;
mod responses;

pub use client::OpenSearchClient;
