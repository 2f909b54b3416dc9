//! Interface definitions for the index client.
//!
//! This module defines the abstract `IndexClient` trait that allows for
//! dependency injection and swappable index backend implementations.

mod index_client;

pub use index_client::IndexClient;
