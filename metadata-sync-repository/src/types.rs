//! Request and outcome types for index operations.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde_json::{json, Map, Value};

use crate::errors::SearchIndexError;
use metadata_sync_shared::DocumentId;

/// Field name to mapping declaration, as stored in the index mapping.
pub type FieldMapping = BTreeMap<String, Value>;

/// Document type used on engines that still require mapping types.
pub const LEGACY_DOC_TYPE: &str = "object";

/// Kind of a bulk action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    Index,
    Delete,
}

impl BulkAction {
    /// Key used for this action in bulk request and response bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One operation of a bulk write.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    /// Create or replace a document.
    Index {
        index: String,
        id: DocumentId,
        source: Value,
        /// Ingest pipeline the document is routed through.
        pipeline: Option<String>,
    },
    /// Remove a document.
    Delete { index: String, id: DocumentId },
}

impl BulkOperation {
    /// Create an index (upsert) operation.
    pub fn index(
        index: impl Into<String>,
        id: DocumentId,
        source: Value,
        pipeline: Option<String>,
    ) -> Self {
        Self::Index {
            index: index.into(),
            id,
            source,
            pipeline,
        }
    }

    /// Create a delete operation.
    pub fn delete(index: impl Into<String>, id: DocumentId) -> Self {
        Self::Delete {
            index: index.into(),
            id,
        }
    }

    pub fn action(&self) -> BulkAction {
        match self {
            Self::Index { .. } => BulkAction::Index,
            Self::Delete { .. } => BulkAction::Delete,
        }
    }

    pub fn id(&self) -> &DocumentId {
        match self {
            Self::Index { id, .. } | Self::Delete { id, .. } => id,
        }
    }

    pub fn index_name(&self) -> &str {
        match self {
            Self::Index { index, .. } | Self::Delete { index, .. } => index,
        }
    }

    /// The action line of this operation in a bulk request body.
    ///
    /// `doc_type` is set for engines that still require a mapping type.
    pub fn action_line(&self, doc_type: Option<&str>) -> Value {
        let (index, id) = (self.index_name(), self.id());
        let mut meta = json!({ "_index": index, "_id": id });
        if let Some(doc_type) = doc_type {
            meta["_type"] = json!(doc_type);
        }
        if let Self::Index {
            pipeline: Some(pipeline),
            ..
        } = self
        {
            meta["pipeline"] = json!(pipeline);
        }
        let mut line = Map::new();
        line.insert(self.action().as_str().to_string(), meta);
        Value::Object(line)
    }
}

/// Outcome of a single bulk operation.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemOutcome {
    pub action: BulkAction,
    pub id: DocumentId,
    /// HTTP status reported for the item.
    pub status: u16,
    /// `result` field of the item (e.g. `created`, `not_found`).
    pub result: Option<String>,
    /// Legacy `found` flag reported by old engines for deletes.
    pub found: Option<bool>,
    /// Structured error attached by the engine.
    pub error: Option<Value>,
    /// Client-side failure (transport error, timeout) for the item.
    pub exception: Option<String>,
}

impl BulkItemOutcome {
    /// Outcome for an item whose request never produced a response.
    pub fn from_exception(operation: &BulkOperation, exception: impl Into<String>) -> Self {
        Self {
            action: operation.action(),
            id: operation.id().clone(),
            status: 0,
            result: None,
            found: None,
            error: None,
            exception: Some(exception.into()),
        }
    }

    /// Whether the engine applied the operation.
    pub fn is_success(&self) -> bool {
        self.exception.is_none() && (200..300).contains(&self.status)
    }

    /// Whether this is a delete of a document that did not exist.
    ///
    /// Modern engines answer `result: not_found`; legacy ones `found: false`.
    pub fn is_missing_delete(&self) -> bool {
        self.action == BulkAction::Delete
            && self.exception.is_none()
            && self.status == 404
            && (self.result.as_deref() == Some("not_found") || self.found == Some(false))
    }

    /// Human readable reason for a failed item.
    ///
    /// Prefers the client-side exception; otherwise the root cause (with the
    /// nested reason when present), then the error type and reason, then the
    /// bare status.
    pub fn failure_reason(&self) -> String {
        if let Some(exception) = &self.exception {
            return exception.clone();
        }
        let Some(error) = &self.error else {
            return self.status.to_string();
        };

        if let Some(root_cause) = error.get("root_cause") {
            let root_cause = describe_root_cause(root_cause);
            return match error
                .get("caused_by")
                .and_then(|c| c.get("reason"))
                .and_then(Value::as_str)
            {
                Some(reason) => format!("{}: {}", root_cause, reason),
                None => root_cause,
            };
        }

        match (
            error.get("type").and_then(Value::as_str),
            error.get("reason").and_then(Value::as_str),
        ) {
            (Some(kind), Some(reason)) => format!("{}: {}", kind, reason),
            (None, Some(reason)) => reason.to_string(),
            _ => self.status.to_string(),
        }
    }
}

fn describe_root_cause(root_cause: &Value) -> String {
    match root_cause {
        Value::Array(causes) => causes
            .iter()
            .map(describe_root_cause)
            .collect::<Vec<_>>()
            .join("; "),
        Value::Object(_) => match (
            root_cause.get("type").and_then(Value::as_str),
            root_cause.get("reason").and_then(Value::as_str),
        ) {
            (Some(kind), Some(reason)) => format!("{} ({})", kind, reason),
            _ => root_cause.to_string(),
        },
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Result of looking up one document in a multi-get.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiGetOutcome {
    pub id: DocumentId,
    /// Whether the document exists.
    pub found: bool,
    /// Requested source fields of the document.
    pub source: Option<Value>,
    /// Per-document lookup error.
    pub error: Option<String>,
}

impl MultiGetOutcome {
    pub fn found(id: DocumentId, source: Value) -> Self {
        Self {
            id,
            found: true,
            source: Some(source),
            error: None,
        }
    }

    pub fn missing(id: DocumentId) -> Self {
        Self {
            id,
            found: false,
            source: None,
            error: None,
        }
    }

    pub fn failed(id: DocumentId, error: impl Into<String>) -> Self {
        Self {
            id,
            found: false,
            source: None,
            error: Some(error.into()),
        }
    }

    /// Integer value of a source field. Numeric strings are accepted since
    /// date fields echo back whatever was indexed.
    pub fn source_i64(&self, field: &str) -> Option<i64> {
        match self.source.as_ref()?.get(field)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Search engine product family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    Elasticsearch,
    OpenSearch,
}

/// Version of the search engine the index lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineVersion {
    pub distribution: Distribution,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl EngineVersion {
    /// Elasticsearch release that removed the generic `string` field type.
    pub const STRING_TYPE_REMOVED: (u32, u32) = (5, 0);

    pub fn new(distribution: Distribution, major: u32, minor: u32, patch: u32) -> Self {
        Self {
            distribution,
            major,
            minor,
            patch,
        }
    }

    /// Parse a version number such as `7.10.2` or `5.0.0-alpha1`.
    pub fn parse(distribution: Distribution, number: &str) -> Result<Self, SearchIndexError> {
        let invalid = || SearchIndexError::parse(format!("Invalid engine version '{}'", number));

        let core = number.split(['-', '+']).next().unwrap_or_default();
        let mut parts = core.split('.');
        let major = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(invalid)?
            .parse()
            .map_err(|_| invalid())?;
        let minor = match parts.next() {
            Some(p) => p.parse().map_err(|_| invalid())?,
            None => 0,
        };
        let patch = match parts.next() {
            Some(p) => p.parse().map_err(|_| invalid())?,
            None => 0,
        };

        Ok(Self::new(distribution, major, minor, patch))
    }

    /// Mapping type the engine requires on writes and mapping updates.
    ///
    /// Elasticsearch before 7.0 rejects typeless requests; later releases
    /// and OpenSearch have no types.
    pub fn mapping_type(&self) -> Option<&'static str> {
        match self.distribution {
            Distribution::Elasticsearch if self.major < 7 => Some(LEGACY_DOC_TYPE),
            _ => None,
        }
    }

    /// Whether the engine still understands the legacy `string` field type.
    ///
    /// Every OpenSearch release descends from Elasticsearch 7 and uses
    /// `text` / `keyword`.
    pub fn supports_string_type(&self) -> bool {
        match self.distribution {
            Distribution::OpenSearch => false,
            Distribution::Elasticsearch => {
                (self.major, self.minor).cmp(&Self::STRING_TYPE_REMOVED) == Ordering::Less
            }
        }
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.distribution {
            Distribution::Elasticsearch => "elasticsearch",
            Distribution::OpenSearch => "opensearch",
        };
        write!(f, "{} {}.{}.{}", name, self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(action: BulkAction, status: u16) -> BulkItemOutcome {
        BulkItemOutcome {
            action,
            id: DocumentId::from_index("doc-1"),
            status,
            result: None,
            found: None,
            error: None,
            exception: None,
        }
    }

    #[test]
    fn test_action_line_with_pipeline() {
        let op = BulkOperation::index(
            "objects",
            DocumentId::from_index("abc"),
            json!({}),
            Some("attachments".to_string()),
        );
        assert_eq!(
            op.action_line(None),
            json!({ "index": { "_index": "objects", "_id": "abc", "pipeline": "attachments" } })
        );

        let op = BulkOperation::delete("objects", DocumentId::from_index("abc"));
        assert_eq!(
            op.action_line(None),
            json!({ "delete": { "_index": "objects", "_id": "abc" } })
        );
    }

    #[test]
    fn test_action_line_carries_legacy_type() {
        let legacy = EngineVersion::new(Distribution::Elasticsearch, 2, 4, 6);
        let doc_type = legacy.mapping_type();

        let op = BulkOperation::delete("objects", DocumentId::from_index("a"));
        assert_eq!(
            op.action_line(doc_type),
            json!({ "delete": { "_index": "objects", "_id": "a", "_type": "object" } })
        );

        let op = BulkOperation::index("objects", DocumentId::from_index("a"), json!({}), None);
        assert_eq!(
            op.action_line(doc_type),
            json!({ "index": { "_index": "objects", "_id": "a", "_type": "object" } })
        );
    }

    #[test]
    fn test_mapping_type_by_version() {
        let es = |major| EngineVersion::new(Distribution::Elasticsearch, major, 0, 0);
        assert_eq!(es(2).mapping_type(), Some("object"));
        assert_eq!(es(6).mapping_type(), Some("object"));
        assert_eq!(es(7).mapping_type(), None);
        assert_eq!(
            EngineVersion::new(Distribution::OpenSearch, 1, 3, 0).mapping_type(),
            None
        );
    }

    #[test]
    fn test_missing_delete_shapes() {
        let mut modern = outcome(BulkAction::Delete, 404);
        modern.result = Some("not_found".to_string());
        assert!(modern.is_missing_delete());

        let mut legacy = outcome(BulkAction::Delete, 404);
        legacy.found = Some(false);
        assert!(legacy.is_missing_delete());

        let mut index_404 = outcome(BulkAction::Index, 404);
        index_404.result = Some("not_found".to_string());
        assert!(!index_404.is_missing_delete());

        let other = outcome(BulkAction::Delete, 404);
        assert!(!other.is_missing_delete());
    }

    #[test]
    fn test_failure_reason_prefers_exception() {
        let mut item = outcome(BulkAction::Index, 500);
        item.exception = Some("request timed out".to_string());
        item.error = Some(json!({ "type": "x", "reason": "y" }));
        assert!(!item.is_success());
        assert_eq!(item.failure_reason(), "request timed out");
    }

    #[test]
    fn test_failure_reason_root_cause() {
        let mut item = outcome(BulkAction::Index, 400);
        item.error = Some(json!({
            "root_cause": [{ "type": "mapper_parsing_exception", "reason": "failed to parse" }],
            "caused_by": { "reason": "For input string: \"abc\"" }
        }));
        assert_eq!(
            item.failure_reason(),
            "mapper_parsing_exception (failed to parse): For input string: \"abc\""
        );

        item.error = Some(json!({
            "root_cause": [{ "type": "mapper_parsing_exception", "reason": "failed to parse" }]
        }));
        assert_eq!(
            item.failure_reason(),
            "mapper_parsing_exception (failed to parse)"
        );
    }

    #[test]
    fn test_failure_reason_fallbacks() {
        let mut item = outcome(BulkAction::Index, 429);
        assert_eq!(item.failure_reason(), "429");

        item.error = Some(json!({ "type": "es_rejected_execution_exception", "reason": "queue full" }));
        assert_eq!(
            item.failure_reason(),
            "es_rejected_execution_exception: queue full"
        );
    }

    #[test]
    fn test_source_i64() {
        let id = DocumentId::from_index("doc-1");
        let doc = MultiGetOutcome::found(id.clone(), json!({ "x-timestamp": 1500 }));
        assert_eq!(doc.source_i64("x-timestamp"), Some(1500));
        assert_eq!(doc.source_i64("other"), None);

        let doc = MultiGetOutcome::found(id.clone(), json!({ "x-timestamp": "1600" }));
        assert_eq!(doc.source_i64("x-timestamp"), Some(1600));

        assert_eq!(MultiGetOutcome::missing(id).source_i64("x-timestamp"), None);
    }

    #[test]
    fn test_engine_version_parse() {
        let v = EngineVersion::parse(Distribution::Elasticsearch, "5.6.16").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (5, 6, 16));
        assert!(!v.supports_string_type());

        let v = EngineVersion::parse(Distribution::Elasticsearch, "2.4.6").unwrap();
        assert!(v.supports_string_type());

        let v = EngineVersion::parse(Distribution::Elasticsearch, "5.0.0-alpha1").unwrap();
        assert!(!v.supports_string_type());

        let v = EngineVersion::parse(Distribution::OpenSearch, "2.11.0").unwrap();
        assert!(!v.supports_string_type());

        assert!(EngineVersion::parse(Distribution::OpenSearch, "").is_err());
        assert!(EngineVersion::parse(Distribution::OpenSearch, "x.y").is_err());
    }
}
