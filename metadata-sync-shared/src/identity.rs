//! Document identifiers.
//!
//! A document identifier is the lowercase hex SHA-256 digest of
//! `account/container/object`. It depends only on the three-part key, so
//! reindexing, updates and deletes of one object always address the same
//! index document.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable identifier of one object's index document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Compute the identifier for an object.
    pub fn compute(account: &str, container: &str, object: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(account.as_bytes());
        hasher.update(b"/");
        hasher.update(container.as_bytes());
        hasher.update(b"/");
        hasher.update(object.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap an identifier returned by the index.
    pub fn from_index(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
