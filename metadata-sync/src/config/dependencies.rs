//! Dependency initialization and wiring for the metadata sync.

use std::sync::Arc;

use tracing::info;

use super::SyncSettings;
use crate::swift::SwiftMetadataFetcher;
use crate::SyncServiceError;
use metadata_sync_pipeline::{
    ensure_mapping, BatchReconciler, ChangeFeed, FileCheckpointStore, MappingReport,
    PartitionRunner,
};
use metadata_sync_repository::{baseline_mapping, EngineVersion, IndexClient, OpenSearchClient};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// Reconciler for hosts that schedule batches themselves.
    pub reconciler: Arc<BatchReconciler>,
    /// Runner draining partitions of the provided change feed.
    pub runner: PartitionRunner,
    /// Version of the engine behind the index.
    pub engine_version: EngineVersion,
    /// Fields added to the mapping at startup.
    pub mapping: MappingReport,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables (and `.env`).
    pub async fn from_env(feed: Arc<dyn ChangeFeed>) -> Result<Self, SyncServiceError> {
        dotenv::dotenv().ok();
        let settings = SyncSettings::from_env()?;
        Self::new(&settings, feed).await
    }

    /// Initialize all dependencies.
    ///
    /// The index mapping is verified (and completed) before anything else is
    /// built; a failure here must stop the process.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(SyncServiceError)` - If initialization fails
    pub async fn new(
        settings: &SyncSettings,
        feed: Arc<dyn ChangeFeed>,
    ) -> Result<Self, SyncServiceError> {
        info!(
            opensearch_url = %settings.opensearch_url,
            index = %settings.index,
            account = %settings.account,
            container = %settings.container,
            "Initializing dependencies"
        );

        let index_client: Arc<dyn IndexClient> =
            Arc::new(OpenSearchClient::new(settings.index_client_config())?);

        let engine_version = index_client.engine_version().await?;
        info!(version = %engine_version, "Connected to search engine");

        let mapping = ensure_mapping(
            index_client.as_ref(),
            &settings.index,
            baseline_mapping(),
            &engine_version,
        )
        .await?;

        let fetcher = Arc::new(SwiftMetadataFetcher::new(
            &settings.swift_url,
            settings.swift_auth_token.clone(),
            settings.request_timeout,
        )?);

        let reconciler = Arc::new(BatchReconciler::new(
            index_client,
            fetcher,
            settings.reconciler_config(),
        ));

        let checkpoints = Arc::new(FileCheckpointStore::new(
            &settings.status_dir,
            &settings.account,
            &settings.container,
            settings.index.clone(),
        ));

        let runner = PartitionRunner::new(
            feed,
            reconciler.clone(),
            checkpoints,
            settings.index.clone(),
            settings.batch_limit,
        );

        Ok(Self {
            reconciler,
            runner,
            engine_version,
            mapping,
        })
    }
}
