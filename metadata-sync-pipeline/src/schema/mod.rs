//! Startup reconciliation of the index mapping.

use tracing::{info, instrument};

use crate::errors::SyncError;
use metadata_sync_repository::{render_mapping, EngineVersion, IndexClient, MappingEntry};

/// Fields added to the mapping by `ensure_mapping`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingReport {
    pub added: Vec<String>,
}

/// Make sure every baseline field is declared in the index mapping.
///
/// Only the fields missing from the current mapping are sent, declared in
/// the format the engine understands; fields already present are never
/// rewritten. An absent index counts as an empty mapping.
///
/// Any failure is fatal: the sync must not run against a mapping it could
/// not verify.
#[instrument(skip_all, fields(index = %index, version = %version))]
pub async fn ensure_mapping(
    client: &dyn IndexClient,
    index: &str,
    baseline: &[MappingEntry],
    version: &EngineVersion,
) -> Result<MappingReport, SyncError> {
    let current = client
        .get_mapping(index)
        .await
        .map_err(SyncError::Mapping)?
        .unwrap_or_default();

    let missing: Vec<&MappingEntry> = baseline
        .iter()
        .filter(|entry| !current.contains_key(entry.name))
        .collect();

    if missing.is_empty() {
        info!("Index mapping already covers the baseline");
        return Ok(MappingReport::default());
    }

    let update = render_mapping(missing.iter().copied(), version);
    client
        .put_mapping(index, &update)
        .await
        .map_err(SyncError::Mapping)?;

    let added: Vec<String> = update.into_keys().collect();
    info!(added = ?added, "Added missing baseline fields to the index mapping");
    Ok(MappingReport { added })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use crate::test_support::{MockIndexClient, INDEX};
    use metadata_sync_repository::{baseline_mapping, Distribution, FieldMapping};
    use serde_json::json;

    fn opensearch() -> EngineVersion {
        EngineVersion::new(Distribution::OpenSearch, 2, 11, 0)
    }

    #[tokio::test]
    async fn test_adds_exactly_the_missing_fields() {
        let mut current = FieldMapping::new();
        current.insert("x-timestamp".into(), json!({ "type": "date" }));
        current.insert("etag".into(), json!({ "type": "string", "index": "not_analyzed" }));
        current.insert("owner".into(), json!({ "type": "text" }));
        let client = MockIndexClient::new().with_mapping(current.clone());

        let report = ensure_mapping(&client, INDEX, baseline_mapping(), &opensearch())
            .await
            .unwrap();

        let baseline: BTreeSet<&str> = baseline_mapping().iter().map(|e| e.name).collect();
        let present: BTreeSet<&str> = current.keys().map(String::as_str).collect();
        let expected: BTreeSet<&str> = baseline.difference(&present).copied().collect();

        let puts = client.put_calls.lock().await;
        assert_eq!(puts.len(), 1);
        let touched: BTreeSet<&str> = puts[0].keys().map(String::as_str).collect();
        assert_eq!(touched, expected);
        assert_eq!(report.added.len(), expected.len());

        let mapping = client.mapping.lock().await;
        let mapping = mapping.as_ref().unwrap();
        assert_eq!(mapping["etag"], current["etag"]);
    }

    #[tokio::test]
    async fn test_complete_mapping_is_left_alone() {
        let complete = render_mapping(baseline_mapping(), &opensearch());
        let client = MockIndexClient::new().with_mapping(complete);

        let report = ensure_mapping(&client, INDEX, baseline_mapping(), &opensearch())
            .await
            .unwrap();

        assert!(report.added.is_empty());
        assert!(client.put_calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_absent_index_gets_full_baseline() {
        let client = MockIndexClient::new();

        let report = ensure_mapping(&client, INDEX, baseline_mapping(), &opensearch())
            .await
            .unwrap();

        assert_eq!(report.added.len(), baseline_mapping().len());
        let puts = client.put_calls.lock().await;
        assert_eq!(puts[0]["etag"], json!({ "type": "keyword" }));
        assert_eq!(
            puts[0]["content-type"],
            json!({ "type": "text", "fields": { "keyword": { "type": "keyword" } } })
        );
    }

    #[tokio::test]
    async fn test_legacy_engine_keeps_string_type() {
        let client = MockIndexClient::new();
        let legacy = EngineVersion::new(Distribution::Elasticsearch, 2, 4, 6);

        ensure_mapping(&client, INDEX, baseline_mapping(), &legacy)
            .await
            .unwrap();

        let puts = client.put_calls.lock().await;
        assert_eq!(puts[0]["content-type"], json!({ "type": "string" }));
        assert_eq!(
            puts[0]["x-trans-id"],
            json!({ "type": "string", "index": "not_analyzed" })
        );
    }

    #[tokio::test]
    async fn test_put_failure_is_fatal() {
        let mut client = MockIndexClient::new();
        client.fail_put_mapping = true;

        let result = ensure_mapping(&client, INDEX, baseline_mapping(), &opensearch()).await;
        assert!(matches!(result, Err(SyncError::Mapping(_))));
    }
}
