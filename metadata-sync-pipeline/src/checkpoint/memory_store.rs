use std::collections::HashMap;
use std::sync::Mutex;

use super::{resume_offset, CheckpointEntry, CheckpointStore};
use crate::errors::CheckpointError;

/// Checkpoint store kept in process memory.
#[derive(Debug)]
pub struct MemoryCheckpointStore {
    index: String,
    entries: Mutex<HashMap<String, CheckpointEntry>>,
}

impl MemoryCheckpointStore {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Raw entry recorded for a partition.
    pub fn entry(&self, partition: &str) -> Option<CheckpointEntry> {
        self.entries.lock().ok()?.get(partition).cloned()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, partition: &str) -> Result<u64, CheckpointError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| CheckpointError::Lock(e.to_string()))?;
        Ok(resume_offset(entries.get(partition), &self.index))
    }

    fn save(&self, partition: &str, offset: u64, index: &str) -> Result<(), CheckpointError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| CheckpointError::Lock(e.to_string()))?;
        entries.insert(
            partition.to_string(),
            CheckpointEntry {
                last_row: offset,
                index: index.to_string(),
            },
        );
        Ok(())
    }
}
