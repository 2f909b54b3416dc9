//! Progress checkpoints.
//!
//! A checkpoint records, per partition, the last row committed to the index
//! together with the index it was committed to. A checkpoint recorded
//! against another index is ignored, so switching indices restarts the sync
//! from the beginning.

mod file_store;
mod memory_store;

pub use file_store::FileCheckpointStore;
pub use memory_store::MemoryCheckpointStore;

use serde::{Deserialize, Serialize};

use crate::errors::CheckpointError;

/// Stored progress of one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub last_row: u64,
    pub index: String,
}

/// Key-value store of partition checkpoints.
///
/// Each store is bound to the index the sync currently writes to.
pub trait CheckpointStore: Send + Sync {
    /// Offset to resume `partition` from.
    ///
    /// Returns 0 when nothing usable is recorded: no entry, an unreadable
    /// record, or an entry written against a different index.
    fn load(&self, partition: &str) -> Result<u64, CheckpointError>;

    /// Record `offset` for `partition` against `index`, leaving the other
    /// partitions untouched.
    fn save(&self, partition: &str, offset: u64, index: &str) -> Result<(), CheckpointError>;
}

/// Offset stored for `partition` if it was recorded against `index`.
fn resume_offset(entry: Option<&CheckpointEntry>, index: &str) -> u64 {
    match entry {
        Some(entry) if entry.index == index => entry.last_row,
        _ => 0,
    }
}
