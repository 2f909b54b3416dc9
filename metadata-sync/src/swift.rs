//! Object-store metadata over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::SyncServiceError;
use metadata_sync_pipeline::{FetchError, MetadataFetcher};
use metadata_sync_shared::ObjectMetadata;

/// Fetches object headers with `HEAD` requests against the object store.
///
/// Header names come back lower-cased. Asking for the freshest copy sends
/// `X-Newest: true`, making the proxy consult every replica.
pub struct SwiftMetadataFetcher {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl SwiftMetadataFetcher {
    /// Create a fetcher for an endpoint such as `http://proxy:8080/v1`.
    pub fn new(
        base_url: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SyncServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncServiceError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    /// URL of an object. Object names keep their `/` separators; every
    /// other reserved character is percent-encoded.
    pub fn object_url(&self, account: &str, container: &str, object: &str) -> String {
        let object = object
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/{}/{}/{}",
            self.base_url,
            urlencoding::encode(account),
            urlencoding::encode(container),
            object
        )
    }
}

#[async_trait]
impl MetadataFetcher for SwiftMetadataFetcher {
    async fn fetch_metadata(
        &self,
        account: &str,
        container: &str,
        object: &str,
        prefer_freshest: bool,
    ) -> Result<ObjectMetadata, FetchError> {
        let url = self.object_url(account, container, object);

        let mut request = self.client.head(&url);
        if let Some(token) = &self.auth_token {
            request = request.header("X-Auth-Token", token);
        }
        if prefer_freshest {
            request = request.header("X-Newest", "true");
        }

        let response = request.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Metadata request failed");
            FetchError::transient(e.to_string())
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(FetchError::NotFound(object.to_string())),
            status if !status.is_success() => {
                return Err(FetchError::transient(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                )))
            }
            _ => {}
        }

        let metadata: ObjectMetadata = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        debug!(object = %object, headers = metadata.len(), "Fetched object metadata");
        Ok(metadata)
    }
}
