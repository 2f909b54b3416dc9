//! In-memory collaborators shared by the pipeline tests.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use crate::fetcher::{FetchError, MetadataFetcher};
use metadata_sync_repository::{
    BulkAction, BulkItemOutcome, BulkOperation, Distribution, EngineVersion, FieldMapping,
    IndexClient, MultiGetOutcome, SearchIndexError,
};
use metadata_sync_shared::{fields, DocumentId, ObjectMetadata};

pub const ACCOUNT: &str = "AUTH_test";
pub const CONTAINER: &str = "photos";
pub const INDEX: &str = "objects";

pub fn doc_id(object: &str) -> DocumentId {
    DocumentId::compute(ACCOUNT, CONTAINER, object)
}

/// Index client backed by a map of stored timestamps.
pub struct MockIndexClient {
    pub stored: Mutex<HashMap<DocumentId, i64>>,
    pub bulk_calls: Mutex<Vec<Vec<BulkOperation>>>,
    pub mget_calls: Mutex<Vec<(Vec<DocumentId>, bool)>>,
    pub mapping: Mutex<Option<FieldMapping>>,
    pub put_calls: Mutex<Vec<FieldMapping>>,
    pub failing_ids: HashSet<DocumentId>,
    pub lookup_errors: HashSet<DocumentId>,
    /// Ids left out of multi-get responses.
    pub unanswered_ids: HashSet<DocumentId>,
    /// Ids appended to multi-get responses although nobody asked for them.
    pub foreign_ids: Vec<DocumentId>,
    pub fail_lookup: bool,
    pub fail_put_mapping: bool,
}

impl MockIndexClient {
    pub fn new() -> Self {
        Self {
            stored: Mutex::new(HashMap::new()),
            bulk_calls: Mutex::new(Vec::new()),
            mget_calls: Mutex::new(Vec::new()),
            mapping: Mutex::new(None),
            put_calls: Mutex::new(Vec::new()),
            failing_ids: HashSet::new(),
            lookup_errors: HashSet::new(),
            unanswered_ids: HashSet::new(),
            foreign_ids: Vec::new(),
            fail_lookup: false,
            fail_put_mapping: false,
        }
    }

    pub fn with_document(mut self, id: DocumentId, timestamp: i64) -> Self {
        self.stored.get_mut().insert(id, timestamp);
        self
    }

    pub fn with_failing_id(mut self, id: DocumentId) -> Self {
        self.failing_ids.insert(id);
        self
    }

    pub fn with_lookup_error(mut self, id: DocumentId) -> Self {
        self.lookup_errors.insert(id);
        self
    }

    pub fn with_unanswered_id(mut self, id: DocumentId) -> Self {
        self.unanswered_ids.insert(id);
        self
    }

    pub fn with_foreign_id(mut self, id: DocumentId) -> Self {
        self.foreign_ids.push(id);
        self
    }

    pub fn with_mapping(mut self, mapping: FieldMapping) -> Self {
        *self.mapping.get_mut() = Some(mapping);
        self
    }

    pub async fn operations(&self, action: BulkAction) -> Vec<BulkOperation> {
        self.bulk_calls
            .lock()
            .await
            .iter()
            .flatten()
            .filter(|op| op.action() == action)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl IndexClient for MockIndexClient {
    async fn bulk_write(
        &self,
        operations: &[BulkOperation],
    ) -> Result<Vec<BulkItemOutcome>, SearchIndexError> {
        self.bulk_calls.lock().await.push(operations.to_vec());
        let mut stored = self.stored.lock().await;

        let outcomes = operations
            .iter()
            .map(|op| {
                let mut outcome = BulkItemOutcome {
                    action: op.action(),
                    id: op.id().clone(),
                    status: 200,
                    result: None,
                    found: None,
                    error: None,
                    exception: None,
                };
                if self.failing_ids.contains(op.id()) {
                    outcome.status = 500;
                    outcome.error = Some(json!({
                        "type": "mapper_parsing_exception",
                        "reason": "failed to parse"
                    }));
                    return outcome;
                }
                match op {
                    BulkOperation::Index { id, source, .. } => {
                        let timestamp = source[fields::TIMESTAMP].as_i64().unwrap_or_default();
                        let created = stored.insert(id.clone(), timestamp).is_none();
                        outcome.status = if created { 201 } else { 200 };
                        outcome.result = Some(if created { "created" } else { "updated" }.into());
                    }
                    BulkOperation::Delete { id, .. } => {
                        if stored.remove(id).is_some() {
                            outcome.result = Some("deleted".into());
                        } else {
                            outcome.status = 404;
                            outcome.result = Some("not_found".into());
                        }
                    }
                }
                outcome
            })
            .collect();
        Ok(outcomes)
    }

    async fn multi_get(
        &self,
        _index: &str,
        ids: &[DocumentId],
        _fields: &[&str],
        refresh: bool,
    ) -> Result<Vec<MultiGetOutcome>, SearchIndexError> {
        self.mget_calls.lock().await.push((ids.to_vec(), refresh));
        if self.fail_lookup {
            return Err(SearchIndexError::connection("index unreachable"));
        }

        let stored = self.stored.lock().await;
        Ok(ids
            .iter()
            .filter(|id| !self.unanswered_ids.contains(*id))
            .map(|id| {
                if self.lookup_errors.contains(id) {
                    return MultiGetOutcome::failed(id.clone(), "shard unavailable");
                }
                match stored.get(id) {
                    Some(ts) => MultiGetOutcome::found(id.clone(), json!({ "x-timestamp": ts })),
                    None => MultiGetOutcome::missing(id.clone()),
                }
            })
            .chain(self.foreign_ids.iter().cloned().map(MultiGetOutcome::missing))
            .collect())
    }

    async fn get_mapping(&self, _index: &str) -> Result<Option<FieldMapping>, SearchIndexError> {
        Ok(self.mapping.lock().await.clone())
    }

    async fn put_mapping(
        &self,
        _index: &str,
        fields: &FieldMapping,
    ) -> Result<(), SearchIndexError> {
        if self.fail_put_mapping {
            return Err(SearchIndexError::mapping("illegal_argument_exception"));
        }
        self.put_calls.lock().await.push(fields.clone());
        let mut mapping = self.mapping.lock().await;
        mapping
            .get_or_insert_with(FieldMapping::new)
            .extend(fields.clone());
        Ok(())
    }

    async fn engine_version(&self) -> Result<EngineVersion, SearchIndexError> {
        Ok(EngineVersion::new(Distribution::OpenSearch, 2, 11, 0))
    }
}

/// Metadata fetcher serving a fixed set of objects.
pub struct MockFetcher {
    pub objects: HashMap<String, ObjectMetadata>,
    pub slow: HashSet<String>,
    pub calls: Mutex<Vec<(String, bool)>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            slow: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Register an object whose metadata timestamp is `seconds`.
    pub fn with_object(mut self, name: &str, seconds: i64) -> Self {
        self.objects.insert(name.to_string(), object_headers(seconds));
        self
    }

    pub fn with_headers(mut self, name: &str, headers: ObjectMetadata) -> Self {
        self.objects.insert(name.to_string(), headers);
        self
    }

    pub fn with_slow_object(mut self, name: &str, seconds: i64) -> Self {
        self.slow.insert(name.to_string());
        self.with_object(name, seconds)
    }
}

#[async_trait]
impl MetadataFetcher for MockFetcher {
    async fn fetch_metadata(
        &self,
        _account: &str,
        _container: &str,
        object: &str,
        prefer_freshest: bool,
    ) -> Result<ObjectMetadata, FetchError> {
        self.calls
            .lock()
            .await
            .push((object.to_string(), prefer_freshest));
        if self.slow.contains(object) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        self.objects
            .get(object)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(object.to_string()))
    }
}

/// Headers of an object last modified at `seconds`.
pub fn object_headers(seconds: i64) -> ObjectMetadata {
    let mut headers = ObjectMetadata::new();
    headers.insert("x-timestamp".into(), format!("{}.00000", seconds));
    headers.insert("last-modified".into(), "Fri, 14 Jul 2017 02:40:00 GMT".into());
    headers.insert("content-type".into(), "image/jpeg".into());
    headers.insert("x-object-meta-owner".into(), "alice".into());
    headers
}

/// Encoded timestamp of a row whose metadata time is `seconds`.
pub fn encoded(seconds: i64) -> String {
    format!("{}.00000", seconds)
}
