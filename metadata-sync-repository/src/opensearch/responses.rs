//! Parsing of OpenSearch response bodies.
//!
//! These functions are pure so the response shapes of both current and
//! legacy engines can be tested without a cluster.

use serde_json::Value;

use crate::errors::SearchIndexError;
use crate::types::{
    BulkItemOutcome, BulkOperation, Distribution, EngineVersion, FieldMapping, MultiGetOutcome,
    LEGACY_DOC_TYPE,
};
use metadata_sync_shared::DocumentId;

/// Parse a bulk response into one outcome per submitted operation.
///
/// Items are matched to operations by position. Operations without a
/// corresponding item are reported as failed with an exception.
pub fn parse_bulk_response(body: &Value, operations: &[BulkOperation]) -> Vec<BulkItemOutcome> {
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    operations
        .iter()
        .enumerate()
        .map(|(position, operation)| {
            let info = items
                .get(position)
                .and_then(|item| item.get(operation.action().as_str()));
            match info {
                Some(info) => BulkItemOutcome {
                    action: operation.action(),
                    id: info
                        .get("_id")
                        .and_then(Value::as_str)
                        .map(DocumentId::from_index)
                        .unwrap_or_else(|| operation.id().clone()),
                    status: info
                        .get("status")
                        .and_then(Value::as_u64)
                        .and_then(|s| u16::try_from(s).ok())
                        .unwrap_or(0),
                    result: info
                        .get("result")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    found: info.get("found").and_then(Value::as_bool),
                    error: info.get("error").cloned(),
                    exception: None,
                },
                None => BulkItemOutcome::from_exception(
                    operation,
                    "bulk response did not include this operation",
                ),
            }
        })
        .collect()
}

/// Parse a multi-get response.
pub fn parse_mget_response(body: &Value) -> Result<Vec<MultiGetOutcome>, SearchIndexError> {
    let docs = body
        .get("docs")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchIndexError::parse("multi-get response has no docs"))?;

    docs.iter()
        .map(|doc| {
            let id = doc
                .get("_id")
                .and_then(Value::as_str)
                .map(DocumentId::from_index)
                .ok_or_else(|| SearchIndexError::parse("multi-get doc has no _id"))?;

            if let Some(error) = doc.get("error") {
                let message = match error {
                    Value::String(s) => s.clone(),
                    other => other
                        .get("reason")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| other.to_string()),
                };
                return Ok(MultiGetOutcome::failed(id, message));
            }

            if doc.get("found").and_then(Value::as_bool).unwrap_or(false) {
                let source = doc
                    .get("_source")
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Default::default()));
                Ok(MultiGetOutcome::found(id, source))
            } else {
                Ok(MultiGetOutcome::missing(id))
            }
        })
        .collect()
}

/// Extract the field properties of an index from a get-mapping response.
///
/// Understands typeless mappings (`mappings.properties`) and legacy typed
/// ones (`mappings.object.properties`). When the index was addressed
/// through an alias the response is keyed by the concrete index name, so a
/// single-entry response is accepted under any name.
pub fn parse_mapping_response(body: &Value, index: &str) -> Option<FieldMapping> {
    let indices = body.as_object()?;
    let entry = match indices.get(index) {
        Some(entry) => entry,
        None if indices.len() == 1 => indices.values().next()?,
        None => return None,
    };

    let mappings = entry.get("mappings")?.as_object()?;
    let properties = match mappings.get("properties") {
        Some(properties) => properties,
        None if mappings.is_empty() => return Some(FieldMapping::new()),
        None => mappings.get(LEGACY_DOC_TYPE)?.get("properties")?,
    };

    Some(
        properties
            .as_object()?
            .iter()
            .map(|(name, declaration)| (name.clone(), declaration.clone()))
            .collect(),
    )
}

/// Parse the cluster info response into an engine version.
pub fn parse_info_response(body: &Value) -> Result<EngineVersion, SearchIndexError> {
    let version = body
        .get("version")
        .ok_or_else(|| SearchIndexError::parse("info response has no version"))?;
    let number = version
        .get("number")
        .and_then(Value::as_str)
        .ok_or_else(|| SearchIndexError::parse("info response has no version number"))?;
    let distribution = match version.get("distribution").and_then(Value::as_str) {
        Some("opensearch") => Distribution::OpenSearch,
        _ => Distribution::Elasticsearch,
    };
    EngineVersion::parse(distribution, number)
}
