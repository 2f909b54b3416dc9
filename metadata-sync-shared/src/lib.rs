//! # Metadata Sync Shared
//!
//! Types shared by the repository and pipeline crates: change rows coming
//! from the object store, the object-store timestamp encoding, document
//! identifiers and the index document itself.

pub mod document;
pub mod identity;
pub mod row;
pub mod timestamp;

pub use document::{fields, IndexDocument, ObjectMetadata, USER_META_PREFIX};
pub use identity::DocumentId;
pub use row::{ChangeRow, RowError};
pub use timestamp::{SwiftTimestamp, TimestampError};
