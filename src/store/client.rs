//! HTTP Object Store Client
//!
//! Talks to an S3-compatible object store over plain HTTP: path-style
//! addressing (`{endpoint}/{bucket}/{key}`), HEAD for metadata, GET for the
//! body. Optional Basic credentials for gateways that want them.
//!
//! No internal retries: transient failures surface to the caller, which
//! decides whether to re-invoke or serve a stale cached copy.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{CONTENT_LENGTH, ETAG, LAST_MODIFIED};
use reqwest::Client;
use tracing::{debug, info};

use super::errors::StoreError;
use super::types::{normalize_etag, parse_http_date, ObjectMeta};
use super::ObjectStore;
use crate::config::Credentials;

/// HTTP client timeout; expiry surfaces as `StoreError::Timeout`
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Object store client for making metadata and body requests
#[derive(Clone)]
pub struct HttpStoreClient {
    /// HTTP client for making requests
    http_client: Client,
    /// Store endpoint, e.g. `https://s3.ap-southeast-1.amazonaws.com`
    endpoint: String,
    /// Pre-built Authorization header value, if credentials were configured
    auth_header: Option<String>,
}

impl HttpStoreClient {
    /// Create a client for the given endpoint
    ///
    /// # Arguments
    /// * `endpoint` - Base URL of the store (scheme + host, no trailing slash)
    /// * `credentials` - Optional access key pair for Basic auth
    pub fn new(endpoint: &str, credentials: Option<&Credentials>) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        let auth_header = credentials.map(|c| {
            let pair = format!("{}:{}", c.key_id, c.secret);
            let encoded = base64::engine::general_purpose::STANDARD.encode(pair);
            format!("Basic {}", encoded)
        });

        Ok(Self {
            http_client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            auth_header,
        })
    }

    /// Build the path-style URL for an object.
    ///
    /// Key segments are percent-encoded individually so `/` separators in
    /// the key survive as path structure.
    fn object_url(&self, bucket: &str, key: &str) -> String {
        let encoded_key = key
            .split('/')
            .map(|seg| urlencoding::encode(seg).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/{}/{}",
            self.endpoint,
            urlencoding::encode(bucket),
            encoded_key
        )
    }

    /// Attach the Authorization header when credentials are configured
    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_header {
            Some(auth) => request.header("Authorization", auth),
            None => request,
        }
    }

    /// Read a required header from a successful HEAD response
    fn require_header<'a>(
        headers: &'a reqwest::header::HeaderMap,
        name: &reqwest::header::HeaderName,
    ) -> Result<&'a str, StoreError> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| StoreError::Request(format!("HEAD response missing {} header", name)))
    }
}

#[async_trait]
impl ObjectStore for HttpStoreClient {
    /// Query the current identity snapshot of an object without its body
    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMeta, StoreError> {
        let url = self.object_url(bucket, key);
        debug!(bucket = bucket, key = key, url = %url, "HEAD object");

        let response = self
            .authorized(self.http_client.head(&url))
            .send()
            .await
            .map_err(StoreError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::from_status(status, &body));
        }

        let headers = response.headers();

        let size = Self::require_header(headers, &CONTENT_LENGTH)?
            .parse::<u64>()
            .map_err(|e| StoreError::Request(format!("Invalid Content-Length: {}", e)))?;
        let content_hash = normalize_etag(Self::require_header(headers, &ETAG)?);
        let modified_time =
            parse_http_date(headers.get(LAST_MODIFIED).and_then(|v| v.to_str().ok()));

        debug!(
            bucket = bucket,
            key = key,
            size = size,
            content_hash = %content_hash,
            "Got object descriptor"
        );

        Ok(ObjectMeta {
            size,
            content_hash,
            modified_time,
        })
    }

    /// Download the full object body
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let url = self.object_url(bucket, key);
        debug!(bucket = bucket, key = key, url = %url, "GET object");

        let response = self
            .authorized(self.http_client.get(&url))
            .send()
            .await
            .map_err(StoreError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::from_status(status, &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(StoreError::from_transport)?;

        info!(
            bucket = bucket,
            key = key,
            size = bytes.len(),
            "Downloaded object from store"
        );
        Ok(bytes.to_vec())
    }
}
