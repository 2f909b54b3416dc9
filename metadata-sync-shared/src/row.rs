//! Change rows delivered by the object store's container listing.

use crate::timestamp::{SwiftTimestamp, TimestampError};
use thiserror::Error;

/// Errors raised while building a change row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    /// The object name is not valid UTF-8.
    #[error("Object name is not valid UTF-8 (row {row_id})")]
    InvalidName { row_id: u64 },
}

/// One mutation notification from the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRow {
    /// Position of the row in its partition; checkpoints record this value.
    pub row_id: u64,
    /// Object name, validated as UTF-8.
    pub name: String,
    /// Whether the row records a deletion.
    pub deleted: bool,
    /// Encoded `(created, content, metadata)` timestamp triple.
    pub created_at: String,
}

impl ChangeRow {
    /// Create a row describing a created or updated object.
    pub fn upsert(row_id: u64, name: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            row_id,
            name: name.into(),
            deleted: false,
            created_at: created_at.into(),
        }
    }

    /// Create a row describing a deleted object.
    pub fn delete(row_id: u64, name: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            row_id,
            name: name.into(),
            deleted: true,
            created_at: created_at.into(),
        }
    }

    /// Build a row from the raw listing fields.
    ///
    /// Object names are carried as bytes by the object store; they are
    /// accepted only when they are valid UTF-8.
    pub fn from_raw(
        row_id: u64,
        name: Vec<u8>,
        deleted: bool,
        created_at: impl Into<String>,
    ) -> Result<Self, RowError> {
        let name = String::from_utf8(name).map_err(|_| RowError::InvalidName { row_id })?;
        Ok(Self {
            row_id,
            name,
            deleted,
            created_at: created_at.into(),
        })
    }

    /// The effective last-modified time of the object.
    ///
    /// The metadata time is always the latest of the three, as it moves
    /// whenever any mutable attribute (including content type) changes.
    pub fn last_modified(&self) -> Result<SwiftTimestamp, TimestampError> {
        SwiftTimestamp::decode_triple(&self.created_at).map(|(_, _, meta)| meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_modified_uses_metadata_time() {
        let row = ChangeRow::upsert(1, "obj", "1500000000.00000+0+186a0");
        assert_eq!(row.last_modified().unwrap().as_millis(), 1_500_000_001_000);
    }

    #[test]
    fn test_from_raw_rejects_invalid_utf8() {
        let err = ChangeRow::from_raw(7, vec![0x66, 0xff, 0x6f], false, "1.0").unwrap_err();
        assert_eq!(err, RowError::InvalidName { row_id: 7 });
    }

    #[test]
    fn test_from_raw_accepts_utf8() {
        let row = ChangeRow::from_raw(3, "ünï".as_bytes().to_vec(), true, "1.0").unwrap();
        assert_eq!(row.name, "ünï");
        assert!(row.deleted);
    }
}
