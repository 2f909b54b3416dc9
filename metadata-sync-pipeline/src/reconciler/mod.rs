//! Batch reconciler.
//!
//! Coordinates one batch of change rows: deletes, staleness resolution,
//! metadata fetches, document building and the bulk writes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, instrument};

use crate::builder::DocumentBuilder;
use crate::errors::{EntryFailure, Operation, SyncError};
use crate::fetcher::{FetchError, MetadataFetcher};
use crate::staleness::StalenessResolver;
use metadata_sync_repository::{BulkOperation, IndexClient};
use metadata_sync_shared::{ChangeRow, DocumentId};

/// Configuration for the batch reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Index documents are written to.
    pub index: String,
    /// Account whose container is synced.
    pub account: String,
    /// Container whose objects are synced.
    pub container: String,
    /// Ingest pipeline index operations are routed through.
    pub pipeline: Option<String>,
    /// Parse user metadata values as JSON.
    pub parse_json: bool,
    /// Maximum number of metadata fetches in flight.
    pub fetch_concurrency: usize,
    /// Deadline of a single metadata fetch.
    pub fetch_timeout: Duration,
}

impl ReconcilerConfig {
    pub fn new(
        index: impl Into<String>,
        account: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            index: index.into(),
            account: account.into(),
            container: container.into(),
            pipeline: None,
            parse_json: false,
            fetch_concurrency: 8,
            fetch_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipeline = Some(pipeline.into());
        self
    }

    pub fn with_parse_json(mut self, parse_json: bool) -> Self {
        self.parse_json = parse_json;
        self
    }

    pub fn with_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch_concurrency = concurrency;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}

/// Consumer of delivered change-row batches.
///
/// A scheduler hands every batch of a partition to its handler, one at a
/// time, and only advances the partition checkpoint when `handle` succeeds.
#[async_trait]
pub trait BatchHandler: Send + Sync {
    async fn handle(&self, rows: &[ChangeRow]) -> Result<(), SyncError>;
}

/// Keeps the index in step with one container.
///
/// For every batch the reconciler:
/// - Deletes the documents of deleted objects
/// - Skips rows the index already reflects
/// - Fetches fresh metadata for the rest and indexes it
/// - Fails the batch as a whole if any entry failed
pub struct BatchReconciler {
    index_client: Arc<dyn IndexClient>,
    fetcher: Arc<dyn MetadataFetcher>,
    resolver: StalenessResolver,
    builder: DocumentBuilder,
    config: ReconcilerConfig,
}

impl BatchReconciler {
    pub fn new(
        index_client: Arc<dyn IndexClient>,
        fetcher: Arc<dyn MetadataFetcher>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            resolver: StalenessResolver::new(index_client.clone(), config.index.clone()),
            builder: DocumentBuilder::with_json_values(config.parse_json),
            index_client,
            fetcher,
            config,
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Reconcile one batch of change rows.
    ///
    /// Returns `SyncError::PartialFailure` when any entry failed; every
    /// failure has been logged by then.
    #[instrument(skip(self, rows), fields(index = %self.config.index, rows = rows.len()))]
    pub async fn reconcile(&self, rows: &[ChangeRow]) -> Result<(), SyncError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut deletes = Vec::new();
        let mut candidates: BTreeMap<DocumentId, ChangeRow> = BTreeMap::new();
        for row in rows {
            let id = DocumentId::compute(&self.config.account, &self.config.container, &row.name);
            if row.deleted {
                deletes.push(BulkOperation::delete(&self.config.index, id));
            } else {
                candidates.insert(id, row.clone());
            }
        }

        let mut failures = Vec::new();
        if !deletes.is_empty() {
            failures.extend(self.submit(&deletes, Operation::Delete).await);
        }

        if candidates.is_empty() {
            return Self::finish(failures);
        }

        let report = self.resolver.classify(&candidates).await;
        failures.extend(report.failures);

        let prepared: Vec<Result<BulkOperation, EntryFailure>> = stream::iter(report.stale)
            .map(|(id, row)| self.prepare(id, row))
            .buffered(self.config.fetch_concurrency.max(1))
            .collect()
            .await;

        let mut upserts = Vec::with_capacity(prepared.len());
        for result in prepared {
            match result {
                Ok(operation) => upserts.push(operation),
                Err(failure) => failures.push(failure),
            }
        }

        if !upserts.is_empty() {
            failures.extend(self.submit(&upserts, Operation::Index).await);
        }

        info!(
            deletes = deletes.len(),
            upserts = upserts.len(),
            candidates = candidates.len(),
            failures = failures.len(),
            "Reconciled batch"
        );
        Self::finish(failures)
    }

    /// Fetch the freshest metadata of a stale object and turn it into an
    /// index operation.
    async fn prepare(&self, id: DocumentId, row: ChangeRow) -> Result<BulkOperation, EntryFailure> {
        let fetch = self.fetcher.fetch_metadata(
            &self.config.account,
            &self.config.container,
            &row.name,
            true,
        );
        let metadata = match tokio::time::timeout(self.config.fetch_timeout, fetch).await {
            Ok(Ok(metadata)) => metadata,
            Ok(Err(e)) => return Err(EntryFailure::for_doc(Operation::Fetch, &id, e.to_string())),
            Err(_) => {
                let millis =
                    u64::try_from(self.config.fetch_timeout.as_millis()).unwrap_or(u64::MAX);
                let e = FetchError::Timeout(millis);
                return Err(EntryFailure::for_doc(Operation::Fetch, &id, e.to_string()));
            }
        };

        let source = self
            .builder
            .build(&metadata, &self.config.account, &self.config.container, &row.name)
            .map_err(|e| EntryFailure::for_doc(Operation::Build, &id, e.to_string()))?
            .to_source()
            .map_err(|e| EntryFailure::for_doc(Operation::Build, &id, e.to_string()))?;

        debug!(doc_id = %id, object = %row.name, "Prepared index operation");
        Ok(BulkOperation::index(
            &self.config.index,
            id,
            source,
            self.config.pipeline.clone(),
        ))
    }

    /// Submit a bulk write and collect the failed items.
    ///
    /// Deletes of documents that do not exist count as success.
    async fn submit(&self, operations: &[BulkOperation], operation: Operation) -> Vec<EntryFailure> {
        match self.index_client.bulk_write(operations).await {
            Ok(outcomes) => outcomes
                .iter()
                .filter(|o| !o.is_success() && !o.is_missing_delete())
                .map(|o| EntryFailure::for_doc(operation, &o.id, o.failure_reason()))
                .collect(),
            Err(e) => {
                let message = e.to_string();
                operations
                    .iter()
                    .map(|op| EntryFailure::for_doc(operation, op.id(), message.clone()))
                    .collect()
            }
        }
    }

    fn finish(failures: Vec<EntryFailure>) -> Result<(), SyncError> {
        if failures.is_empty() {
            return Ok(());
        }
        for failure in &failures {
            error!(
                operation = %failure.operation,
                doc_id = failure.doc_id.as_ref().map(DocumentId::as_str).unwrap_or("-"),
                message = %failure.message,
                "Entry failed"
            );
        }
        Err(SyncError::PartialFailure { failures })
    }
}

#[async_trait]
impl BatchHandler for BatchReconciler {
    async fn handle(&self, rows: &[ChangeRow]) -> Result<(), SyncError> {
        self.reconcile(rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        doc_id, encoded, MockFetcher, MockIndexClient, ACCOUNT, CONTAINER, INDEX,
    };
    use metadata_sync_repository::BulkAction;
    use metadata_sync_shared::ObjectMetadata;

    fn config() -> ReconcilerConfig {
        ReconcilerConfig::new(INDEX, ACCOUNT, CONTAINER)
    }

    fn reconciler(
        client: &Arc<MockIndexClient>,
        fetcher: &Arc<MockFetcher>,
        config: ReconcilerConfig,
    ) -> BatchReconciler {
        BatchReconciler::new(client.clone(), fetcher.clone(), config)
    }

    #[tokio::test]
    async fn test_new_and_deleted_object() {
        let client = Arc::new(MockIndexClient::new().with_document(doc_id("gone.jpg"), 1_000));
        let fetcher = Arc::new(MockFetcher::new().with_object("new.jpg", 1_500_000_000));
        let reconciler = reconciler(&client, &fetcher, config());

        let rows = vec![
            ChangeRow::upsert(1, "new.jpg", encoded(1_500_000_000)),
            ChangeRow::delete(2, "gone.jpg", encoded(1_500_000_001)),
        ];
        reconciler.reconcile(&rows).await.unwrap();

        let deletes = client.operations(BulkAction::Delete).await;
        let indexes = client.operations(BulkAction::Index).await;
        assert_eq!(deletes.len(), 1);
        assert_eq!(indexes.len(), 1);
        assert_eq!(deletes[0].id(), &doc_id("gone.jpg"));
        assert_eq!(indexes[0].id(), &doc_id("new.jpg"));

        let stored = client.stored.lock().await;
        assert_eq!(stored.get(&doc_id("new.jpg")), Some(&1_500_000_000_000));
        assert!(!stored.contains_key(&doc_id("gone.jpg")));
    }

    #[tokio::test]
    async fn test_delete_of_missing_document_succeeds() {
        let client = Arc::new(MockIndexClient::new());
        let fetcher = Arc::new(MockFetcher::new());
        let reconciler = reconciler(&client, &fetcher, config());

        let rows = vec![ChangeRow::delete(1, "never-indexed", encoded(1_000))];
        reconciler.reconcile(&rows).await.unwrap();
        reconciler.reconcile(&rows).await.unwrap();

        assert_eq!(client.operations(BulkAction::Delete).await.len(), 2);
        assert!(client.mget_calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_partial_bulk_failure() {
        let client = Arc::new(MockIndexClient::new().with_failing_id(doc_id("b")));
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_object("a", 1_000)
                .with_object("b", 1_000)
                .with_object("c", 1_000),
        );
        let reconciler = reconciler(&client, &fetcher, config());

        let rows = vec![
            ChangeRow::upsert(1, "a", encoded(1_000)),
            ChangeRow::upsert(2, "b", encoded(1_000)),
            ChangeRow::upsert(3, "c", encoded(1_000)),
        ];
        let err = reconciler.reconcile(&rows).await.unwrap_err();

        assert_eq!(err.to_string(), "Failed to process some entries");
        let failures = err.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].operation, Operation::Index);
        assert_eq!(failures[0].doc_id, Some(doc_id("b")));
        assert_eq!(failures[0].message, "mapper_parsing_exception: failed to parse");

        assert_eq!(client.operations(BulkAction::Index).await.len(), 3);
        let stored = client.stored.lock().await;
        assert!(stored.contains_key(&doc_id("a")));
        assert!(stored.contains_key(&doc_id("c")));
    }

    #[tokio::test]
    async fn test_current_rows_are_skipped() {
        let client = Arc::new(MockIndexClient::new().with_document(doc_id("a"), 1_000_000));
        let fetcher = Arc::new(MockFetcher::new().with_object("a", 1_000));
        let reconciler = reconciler(&client, &fetcher, config());

        let rows = vec![ChangeRow::upsert(1, "a", encoded(1_000))];
        reconciler.reconcile(&rows).await.unwrap();

        assert!(fetcher.calls.lock().await.is_empty());
        assert!(client.bulk_calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_redelivered_batch_is_cheap() {
        let client = Arc::new(MockIndexClient::new());
        let fetcher = Arc::new(MockFetcher::new().with_object("a", 1_000));
        let reconciler = reconciler(&client, &fetcher, config());

        let rows = vec![ChangeRow::upsert(1, "a", encoded(1_000))];
        reconciler.reconcile(&rows).await.unwrap();
        reconciler.reconcile(&rows).await.unwrap();

        assert_eq!(fetcher.calls.lock().await.len(), 1);
        assert_eq!(client.bulk_calls.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let client = Arc::new(MockIndexClient::new());
        let fetcher = Arc::new(MockFetcher::new());
        let reconciler = reconciler(&client, &fetcher, config());

        reconciler.reconcile(&[]).await.unwrap();

        assert!(client.bulk_calls.lock().await.is_empty());
        assert!(client.mget_calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_requests_freshest_and_failures_are_per_item() {
        let client = Arc::new(MockIndexClient::new());
        let fetcher = Arc::new(MockFetcher::new().with_object("present", 1_000));
        let reconciler = reconciler(&client, &fetcher, config());

        let rows = vec![
            ChangeRow::upsert(1, "present", encoded(1_000)),
            ChangeRow::upsert(2, "vanished", encoded(1_000)),
        ];
        let err = reconciler.reconcile(&rows).await.unwrap_err();

        let failures = err.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].operation, Operation::Fetch);
        assert_eq!(failures[0].doc_id, Some(doc_id("vanished")));

        assert_eq!(client.operations(BulkAction::Index).await.len(), 1);
        assert!(fetcher.calls.lock().await.iter().all(|(_, fresh)| *fresh));
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_per_item() {
        let client = Arc::new(MockIndexClient::new());
        let fetcher = Arc::new(
            MockFetcher::new()
                .with_object("fast", 1_000)
                .with_slow_object("slow", 1_000),
        );
        let config = config().with_fetch_timeout(Duration::from_millis(20));
        let reconciler = reconciler(&client, &fetcher, config);

        let rows = vec![
            ChangeRow::upsert(1, "fast", encoded(1_000)),
            ChangeRow::upsert(2, "slow", encoded(1_000)),
        ];
        let err = reconciler.reconcile(&rows).await.unwrap_err();

        let failures = err.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].doc_id, Some(doc_id("slow")));
        assert_eq!(failures[0].message, "Timed out after 20 ms");
        assert_eq!(client.operations(BulkAction::Index).await.len(), 1);
    }

    #[tokio::test]
    async fn test_build_failure_is_per_item() {
        let mut headers = ObjectMetadata::new();
        headers.insert("x-timestamp".into(), "1000.00000".into());

        let client = Arc::new(MockIndexClient::new());
        let fetcher = Arc::new(MockFetcher::new().with_headers("bare", headers));
        let reconciler = reconciler(&client, &fetcher, config());

        let rows = vec![ChangeRow::upsert(1, "bare", encoded(1_000))];
        let err = reconciler.reconcile(&rows).await.unwrap_err();

        assert_eq!(err.failures()[0].operation, Operation::Build);
        assert!(client.bulk_calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_pipeline_is_attached_to_index_operations() {
        let client = Arc::new(MockIndexClient::new());
        let fetcher = Arc::new(MockFetcher::new().with_object("a", 1_000));
        let config = config().with_pipeline("attachments");
        let reconciler = reconciler(&client, &fetcher, config);

        reconciler
            .reconcile(&[ChangeRow::upsert(1, "a", encoded(1_000))])
            .await
            .unwrap();

        let indexes = client.operations(BulkAction::Index).await;
        match &indexes[0] {
            BulkOperation::Index { pipeline, source, .. } => {
                assert_eq!(pipeline.as_deref(), Some("attachments"));
                assert_eq!(source["owner"], "alice");
                assert_eq!(source["x-swift-object"], "a");
            }
            other => panic!("unexpected operation {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_rows_keep_last() {
        // Stored between the two rows: only the later row is stale.
        let client = Arc::new(MockIndexClient::new().with_document(doc_id("a"), 1_500_000));
        let fetcher = Arc::new(MockFetcher::new().with_object("a", 2_000));
        let reconciler = reconciler(&client, &fetcher, config());

        let rows = vec![
            ChangeRow::upsert(1, "a", encoded(1_000)),
            ChangeRow::upsert(2, "a", encoded(2_000)),
        ];
        reconciler.reconcile(&rows).await.unwrap();

        assert_eq!(client.mget_calls.lock().await[0].0, vec![doc_id("a")]);
        let indexes = client.operations(BulkAction::Index).await;
        assert_eq!(indexes.len(), 1);
        assert_eq!(fetcher.calls.lock().await.len(), 1);

        let reversed = Arc::new(MockIndexClient::new().with_document(doc_id("a"), 1_500_000));
        let reconciler = self::reconciler(&reversed, &fetcher, config());
        let rows = vec![
            ChangeRow::upsert(1, "a", encoded(2_000)),
            ChangeRow::upsert(2, "a", encoded(1_000)),
        ];
        reconciler.reconcile(&rows).await.unwrap();

        assert!(reversed.operations(BulkAction::Index).await.is_empty());
    }

    #[tokio::test]
    async fn test_handle_delegates_to_reconcile() {
        let client = Arc::new(MockIndexClient::new());
        let fetcher = Arc::new(MockFetcher::new().with_object("a", 1_000));
        let handler: Arc<dyn BatchHandler> =
            Arc::new(reconciler(&client, &fetcher, config()));

        handler
            .handle(&[ChangeRow::upsert(1, "a", encoded(1_000))])
            .await
            .unwrap();

        assert_eq!(client.operations(BulkAction::Index).await.len(), 1);
    }
}
