//! Document builder.
//!
//! Transforms object metadata (headers) into the document stored in the
//! search index.

use std::collections::HashMap;

use chrono::DateTime;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::DocumentBuildError;
use metadata_sync_shared::{fields, IndexDocument, ObjectMetadata, SwiftTimestamp, USER_META_PREFIX};

/// Builds index documents from object metadata.
///
/// The builder is responsible for:
/// - Converting the object timestamp and Last-Modified date to milliseconds
/// - Copying the identity fields
/// - Extracting user metadata, optionally parsing values as JSON
/// - Copying the system headers that are present
#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder {
    parse_json: bool,
}

impl DocumentBuilder {
    /// Create a builder that stores user metadata values as strings.
    pub fn new() -> Self {
        Self { parse_json: false }
    }

    /// Create a builder that parses user metadata values as JSON when
    /// possible, falling back to the raw string.
    pub fn with_json_values(parse_json: bool) -> Self {
        Self { parse_json }
    }

    /// Build the document for one object.
    ///
    /// Fails when the object timestamp or Last-Modified header is missing or
    /// cannot be parsed. System headers that are absent are simply left out.
    pub fn build(
        &self,
        metadata: &ObjectMetadata,
        account: &str,
        container: &str,
        object: &str,
    ) -> Result<IndexDocument, DocumentBuildError> {
        let headers: HashMap<String, &str> = metadata
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.as_str()))
            .collect();

        let timestamp = headers
            .get(fields::TIMESTAMP)
            .ok_or(DocumentBuildError::MissingHeader(fields::TIMESTAMP))?;
        let timestamp = SwiftTimestamp::parse(timestamp)?.as_millis();

        let last_modified = headers
            .get(fields::LAST_MODIFIED)
            .ok_or(DocumentBuildError::MissingHeader(fields::LAST_MODIFIED))?;
        let last_modified = DateTime::parse_from_rfc2822(last_modified.trim())
            .map_err(|_| DocumentBuildError::InvalidDate(last_modified.to_string()))?
            .timestamp()
            * 1000;

        let mut document = IndexDocument::new(timestamp, last_modified, account, container, object);

        for (name, value) in &headers {
            let Some(key) = name.strip_prefix(USER_META_PREFIX) else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            if fields::RESERVED.contains(&key) {
                warn!(object = %object, key = %key, "Ignoring user metadata shadowing a reserved field");
                continue;
            }
            document
                .user_metadata
                .insert(key.to_string(), self.user_value(value));
        }

        // User metadata takes precedence over system headers of the same name
        let copy = |field: &str| -> Option<&str> {
            if document.user_metadata.contains_key(field) {
                return None;
            }
            headers.get(field).copied()
        };

        let content_length = copy(fields::CONTENT_LENGTH).and_then(|v| match v.trim().parse() {
            Ok(length) => Some(length),
            Err(_) => {
                warn!(object = %object, value = %v, "Ignoring unparsable content-length");
                None
            }
        });
        let content_type = copy(fields::CONTENT_TYPE).map(str::to_string);
        let etag = copy(fields::ETAG).map(str::to_string);
        let manifest = copy(fields::MANIFEST).map(str::to_string);
        let static_large_object = copy(fields::STATIC_LARGE_OBJECT).map(is_true_value);
        let trans_id = copy(fields::TRANS_ID).map(str::to_string);

        document.content_length = content_length;
        document.content_type = content_type;
        document.etag = etag;
        document.manifest = manifest;
        document.static_large_object = static_large_object;
        document.trans_id = trans_id;

        debug!(
            object = %object,
            user_fields = document.user_metadata.len(),
            "Built index document"
        );
        Ok(document)
    }

    fn user_value(&self, raw: &str) -> Value {
        if self.parse_json {
            if let Ok(value) = serde_json::from_str::<Value>(raw) {
                return value;
            }
        }
        Value::String(raw.to_string())
    }
}

/// Object-store truthiness: `true`, `1`, `yes`, `on`, `t`, `y`.
fn is_true_value(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "t" | "y"
    )
}
