//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `IndexClient` using
//! the OpenSearch Rust client.

use async_trait::async_trait;
use opensearch::{
    http::headers::HeaderMap,
    http::request::JsonBody,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    http::Method,
    indices::IndicesGetMappingParts,
    BulkParts, MgetParts, OpenSearch,
};
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::IndexClientConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::IndexClient;
use crate::opensearch::responses::{
    parse_bulk_response, parse_info_response, parse_mapping_response, parse_mget_response,
};
use crate::types::{BulkItemOutcome, BulkOperation, EngineVersion, FieldMapping, MultiGetOutcome};
use metadata_sync_shared::DocumentId;

/// OpenSearch client implementation.
///
/// The engine version is read once and cached; engines that still require
/// mapping types get the legacy type on bulk action lines and mapping
/// updates.
///
/// # Example
///
/// ```ignore
/// use metadata_sync_repository::{IndexClientConfig, OpenSearchClient};
///
/// let config = IndexClientConfig::new("http://localhost:9200");
/// let client = OpenSearchClient::new(config)?;
/// let version = client.engine_version().await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
    config: IndexClientConfig,
    version: OnceCell<EngineVersion>,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client for the configured URL.
    ///
    /// Every request carries the configured timeout.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(SearchIndexError)` - If the URL or transport setup is invalid
    pub fn new(config: IndexClientConfig) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(&config.url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .timeout(config.request_timeout)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %config.url,
            timeout_ms = u64::try_from(config.request_timeout.as_millis()).unwrap_or(u64::MAX),
            bulk_chunk_size = config.bulk_chunk_size,
            "Created OpenSearch client"
        );

        Ok(Self {
            client,
            config,
            version: OnceCell::new(),
        })
    }

    async fn fetch_engine_version(&self) -> Result<EngineVersion, SearchIndexError> {
        let response = self
            .client
            .info()
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let body = Self::read_json(response).await?;
        parse_info_response(&body)
    }

    /// Check if the number of operations exceeds the configured limit.
    fn validate_batch_size(&self, size: usize) -> Result<(), SearchIndexError> {
        if let Some(max) = self.config.max_batch_size {
            if size > max {
                return Err(SearchIndexError::batch_size_exceeded(size, max));
            }
        }
        Ok(())
    }

    /// Read a JSON body from a successful response.
    async fn read_json(response: Response) -> Result<Value, SearchIndexError> {
        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchIndexError::request(status.as_u16(), body));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))
    }

    /// Send one bulk request. Never fails as a whole: transport and
    /// response errors are attached to every operation of the chunk.
    async fn send_bulk_chunk(
        &self,
        chunk: &[BulkOperation],
        doc_type: Option<&str>,
    ) -> Vec<BulkItemOutcome> {
        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(chunk.len() * 2);
        for operation in chunk {
            body.push(operation.action_line(doc_type).into());
            if let BulkOperation::Index { source, .. } = operation {
                body.push(source.clone().into());
            }
        }

        let response = match self.client.bulk(BulkParts::None).body(body).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, count = chunk.len(), "Bulk request failed");
                let reason = e.to_string();
                return chunk
                    .iter()
                    .map(|op| BulkItemOutcome::from_exception(op, reason.clone()))
                    .collect();
            }
        };

        match Self::read_json(response).await {
            Ok(body) => parse_bulk_response(&body, chunk),
            Err(e) => {
                error!(error = %e, count = chunk.len(), "Bulk request rejected");
                let reason = e.to_string();
                chunk
                    .iter()
                    .map(|op| BulkItemOutcome::from_exception(op, reason.clone()))
                    .collect()
            }
        }
    }
}

#[async_trait]
impl IndexClient for OpenSearchClient {
    /// Submit operations in chunks of `bulk_chunk_size` actions.
    #[instrument(skip(self, operations), fields(count = operations.len()))]
    async fn bulk_write(
        &self,
        operations: &[BulkOperation],
    ) -> Result<Vec<BulkItemOutcome>, SearchIndexError> {
        if operations.is_empty() {
            return Ok(Vec::new());
        }
        self.validate_batch_size(operations.len())?;
        let doc_type = self.engine_version().await?.mapping_type();

        let mut outcomes = Vec::with_capacity(operations.len());
        for chunk in operations.chunks(self.config.bulk_chunk_size.max(1)) {
            outcomes.extend(self.send_bulk_chunk(chunk, doc_type).await);
        }

        debug!(
            succeeded = outcomes.iter().filter(|o| o.is_success()).count(),
            "Bulk write completed"
        );
        Ok(outcomes)
    }

    #[instrument(skip(self, ids, fields), fields(count = ids.len()))]
    async fn multi_get(
        &self,
        index: &str,
        ids: &[DocumentId],
        fields: &[&str],
        refresh: bool,
    ) -> Result<Vec<MultiGetOutcome>, SearchIndexError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .mget(MgetParts::Index(index))
            ._source(fields)
            .refresh(refresh)
            .body(json!({ "ids": ids }))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let body = Self::read_json(response).await?;
        parse_mget_response(&body)
    }

    async fn get_mapping(&self, index: &str) -> Result<Option<FieldMapping>, SearchIndexError> {
        let response = self
            .client
            .indices()
            .get_mapping(IndicesGetMappingParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        // 404 means the index does not exist yet
        if response.status_code().as_u16() == 404 {
            debug!(index = %index, "Index not found while reading mapping");
            return Ok(None);
        }

        let body = Self::read_json(response).await?;
        Ok(parse_mapping_response(&body, index))
    }

    async fn put_mapping(
        &self,
        index: &str,
        fields: &FieldMapping,
    ) -> Result<(), SearchIndexError> {
        let doc_type = self.engine_version().await?.mapping_type();
        let path = mapping_path(index, doc_type);
        let body: JsonBody<Value> = json!({ "properties": fields }).into();

        let response = self
            .client
            .send(
                Method::Put,
                &path,
                HeaderMap::new(),
                Option::<&Value>::None,
                Some(body),
                None,
            )
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Put mapping request failed");
            return Err(SearchIndexError::mapping(format!(
                "Put mapping failed with status {}: {}",
                status, error_body
            )));
        }

        info!(index = %index, path = %path, fields = fields.len(), "Index mapping updated");
        Ok(())
    }

    async fn engine_version(&self) -> Result<EngineVersion, SearchIndexError> {
        self.version
            .get_or_try_init(|| self.fetch_engine_version())
            .await
            .copied()
    }
}

/// Path of the put-mapping endpoint, typed when the engine needs it.
fn mapping_path(index: &str, doc_type: Option<&str>) -> String {
    match doc_type {
        Some(doc_type) => format!("/{}/_mapping/{}", index, doc_type),
        None => format!("/{}/_mapping", index),
    }
}
