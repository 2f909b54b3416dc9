//! Settings loaded from the environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::SyncServiceError;
use metadata_sync_pipeline::ReconcilerConfig;
use metadata_sync_repository::IndexClientConfig;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default index documents are written to.
const DEFAULT_INDEX: &str = "swift-metadata";

/// Default object-store endpoint, up to and including the API version.
const DEFAULT_SWIFT_URL: &str = "http://localhost:8080/v1";

/// Default directory holding checkpoint files.
const DEFAULT_STATUS_DIR: &str = "/var/lib/metadata-sync";

const DEFAULT_FETCH_CONCURRENCY: usize = 8;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_BATCH_LIMIT: usize = 1000;

/// Everything the service needs to know to run.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub opensearch_url: String,
    pub index: String,
    pub swift_url: String,
    pub swift_auth_token: Option<String>,
    pub account: String,
    pub container: String,
    pub status_dir: PathBuf,
    pub pipeline: Option<String>,
    pub parse_json: bool,
    pub fetch_concurrency: usize,
    /// Timeout applied to index requests and metadata fetches.
    pub request_timeout: Duration,
    /// Maximum number of rows per batch.
    pub batch_limit: usize,
}

impl SyncSettings {
    /// Load settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `SYNC_INDEX`: target index (default: swift-metadata)
    /// - `SWIFT_URL`: object-store endpoint (default: http://localhost:8080/v1)
    /// - `SWIFT_AUTH_TOKEN`: token sent as `X-Auth-Token` (optional)
    /// - `SWIFT_ACCOUNT`, `SWIFT_CONTAINER`: container to sync (required)
    /// - `SYNC_STATUS_DIR`: checkpoint directory (default: /var/lib/metadata-sync)
    /// - `SYNC_PIPELINE`: ingest pipeline for index operations (optional)
    /// - `SYNC_PARSE_JSON`: parse user metadata as JSON (default: false)
    /// - `SYNC_FETCH_CONCURRENCY`: parallel metadata fetches (default: 8)
    /// - `SYNC_REQUEST_TIMEOUT_MS`: request timeout (default: 30000)
    /// - `SYNC_BATCH_LIMIT`: rows per batch (default: 1000)
    pub fn from_env() -> Result<Self, SyncServiceError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SyncServiceError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            var(key).ok_or_else(|| SyncServiceError::config(format!("{} must be set", key)))
        };

        Ok(Self {
            opensearch_url: var("OPENSEARCH_URL")
                .unwrap_or_else(|| DEFAULT_OPENSEARCH_URL.to_string()),
            index: var("SYNC_INDEX").unwrap_or_else(|| DEFAULT_INDEX.to_string()),
            swift_url: var("SWIFT_URL").unwrap_or_else(|| DEFAULT_SWIFT_URL.to_string()),
            swift_auth_token: var("SWIFT_AUTH_TOKEN"),
            account: required("SWIFT_ACCOUNT")?,
            container: required("SWIFT_CONTAINER")?,
            status_dir: var("SYNC_STATUS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATUS_DIR)),
            pipeline: var("SYNC_PIPELINE"),
            parse_json: var("SYNC_PARSE_JSON")
                .map(|v| parse_flag("SYNC_PARSE_JSON", &v))
                .transpose()?
                .unwrap_or(false),
            fetch_concurrency: parse_or(
                "SYNC_FETCH_CONCURRENCY",
                var("SYNC_FETCH_CONCURRENCY"),
                DEFAULT_FETCH_CONCURRENCY,
            )?,
            request_timeout: Duration::from_millis(parse_or(
                "SYNC_REQUEST_TIMEOUT_MS",
                var("SYNC_REQUEST_TIMEOUT_MS"),
                DEFAULT_REQUEST_TIMEOUT_MS,
            )?),
            batch_limit: parse_or("SYNC_BATCH_LIMIT", var("SYNC_BATCH_LIMIT"), DEFAULT_BATCH_LIMIT)?,
        })
    }

    pub fn index_client_config(&self) -> IndexClientConfig {
        IndexClientConfig::new(&self.opensearch_url).with_request_timeout(self.request_timeout)
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        let config = ReconcilerConfig::new(&self.index, &self.account, &self.container)
            .with_parse_json(self.parse_json)
            .with_fetch_concurrency(self.fetch_concurrency)
            .with_fetch_timeout(self.request_timeout);
        match &self.pipeline {
            Some(pipeline) => config.with_pipeline(pipeline),
            None => config,
        }
    }
}

fn parse_or<T: FromStr>(
    key: &str,
    value: Option<String>,
    default: T,
) -> Result<T, SyncServiceError> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| SyncServiceError::config(format!("{} has an invalid value '{}'", key, v))),
        None => Ok(default),
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, SyncServiceError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SyncServiceError::config(format!(
            "{} has an invalid value '{}'",
            key, value
        ))),
    }
}
