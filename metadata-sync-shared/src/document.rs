//! The index-side representation of an object.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Header prefix carrying user-supplied object metadata.
pub const USER_META_PREFIX: &str = "x-object-meta-";

/// Object metadata as returned by the object store: header name to value.
pub type ObjectMetadata = HashMap<String, String>;

/// Index field names shared by the document and the baseline mapping.
pub mod fields {
    pub const TIMESTAMP: &str = "x-timestamp";
    pub const LAST_MODIFIED: &str = "last-modified";
    pub const ACCOUNT: &str = "x-swift-account";
    pub const CONTAINER: &str = "x-swift-container";
    pub const OBJECT: &str = "x-swift-object";
    pub const CONTENT_LENGTH: &str = "content-length";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const ETAG: &str = "etag";
    pub const MANIFEST: &str = "x-object-manifest";
    pub const STATIC_LARGE_OBJECT: &str = "x-static-large-object";
    pub const TRANS_ID: &str = "x-trans-id";

    /// Fields that are always populated from the object itself and can never
    /// be overridden by user metadata.
    pub const RESERVED: &[&str] = &[TIMESTAMP, LAST_MODIFIED, ACCOUNT, CONTAINER, OBJECT];

    /// System fields copied from the object headers when present.
    pub const SYSTEM: &[&str] = &[
        CONTENT_LENGTH,
        CONTENT_TYPE,
        ETAG,
        MANIFEST,
        STATIC_LARGE_OBJECT,
        TRANS_ID,
    ];
}

/// Document stored in the search index for one object.
///
/// The fixed fields are the baseline the index mapping is reconciled
/// against. User metadata keys are not known in advance and are flattened
/// into the same JSON object on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// Object timestamp in milliseconds; the staleness oracle.
    #[serde(rename = "x-timestamp")]
    pub timestamp: i64,
    /// Last-Modified header in milliseconds since the epoch.
    #[serde(rename = "last-modified")]
    pub last_modified: i64,
    #[serde(rename = "x-swift-account")]
    pub account: String,
    #[serde(rename = "x-swift-container")]
    pub container: String,
    #[serde(rename = "x-swift-object")]
    pub object: String,
    #[serde(rename = "content-length", default, skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    #[serde(rename = "content-type", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(rename = "x-object-manifest", default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,
    #[serde(
        rename = "x-static-large-object",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub static_large_object: Option<bool>,
    #[serde(rename = "x-trans-id", default, skip_serializing_if = "Option::is_none")]
    pub trans_id: Option<String>,
    /// User metadata with the header prefix stripped.
    #[serde(flatten)]
    pub user_metadata: BTreeMap<String, Value>,
}

impl IndexDocument {
    /// Create a document carrying only the reserved fields.
    pub fn new(
        timestamp: i64,
        last_modified: i64,
        account: impl Into<String>,
        container: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            last_modified,
            account: account.into(),
            container: container.into(),
            object: object.into(),
            content_length: None,
            content_type: None,
            etag: None,
            manifest: None,
            static_large_object: None,
            trans_id: None,
            user_metadata: BTreeMap::new(),
        }
    }

    /// Serialize to the JSON body sent to the index.
    pub fn to_source(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
