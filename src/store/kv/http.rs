//! Key-value client for a networked store speaking plain HTTP.
//!
//! `GET/PUT/DELETE {base_url}/{key}` address single records and
//! `GET {base_url}?prefix=...` lists keys as a JSON array of strings. A `404`
//! means the key is absent; any other non-success status is a failure.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;

use super::KeyValueBackend;
use crate::store::traits::StoreError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpKeyValue {
    base_url: String,
    client: Client,
}

impl HttpKeyValue {
    /// Client for the store at `base_url`, with a per-request timeout.
    pub fn new(base_url: &str, request_timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(request_timeout)
                .connect_timeout(CONNECT_TIMEOUT.min(request_timeout))
                .build()
                .unwrap_or_else(|error| {
                    tracing::warn!("Failed to build HTTP key-value client: {error}");
                    Client::new()
                }),
        }
    }

    fn base(&self) -> Result<Url, StoreError> {
        Url::parse(&self.base_url).map_err(|e| StoreError::unavailable(self.name(), e))
    }

    /// URL of a single record. The key is percent-encoded as one path
    /// segment.
    fn key_url(&self, key: &str) -> Result<Url, StoreError> {
        let mut url = self.base()?;
        url.path_segments_mut()
            .map_err(|()| {
                StoreError::unavailable(self.name(), "base url cannot carry a path")
            })?
            .pop_if_empty()
            .push(key);
        Ok(url)
    }

    fn failure(&self, error: reqwest::Error) -> StoreError {
        StoreError::unavailable(self.name(), error)
    }

    async fn status_failure(&self, response: reqwest::Response) -> StoreError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        StoreError::unavailable(self.name(), format!("HTTP {status}: {body}"))
    }
}

#[async_trait]
impl KeyValueBackend for HttpKeyValue {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let response = self
            .client
            .get(self.key_url(key)?)
            .send()
            .await
            .map_err(|e| self.failure(e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(self.status_failure(response).await);
        }
        let bytes = response.bytes().await.map_err(|e| self.failure(e))?;
        Ok(Some(bytes.to_vec()))
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut request = self
            .client
            .put(self.key_url(key)?)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(value);
        if let Some(ttl) = ttl {
            request = request.query(&[("ttl", super::ttl_secs(ttl))]);
        }

        let response = request.send().await.map_err(|e| self.failure(e))?;
        if !response.status().is_success() {
            return Err(self.status_failure(response).await);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .delete(self.key_url(key)?)
            .send()
            .await
            .map_err(|e| self.failure(e))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(self.status_failure(response).await)
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let response = self
            .client
            .get(self.base()?)
            .query(&[("prefix", prefix)])
            .send()
            .await
            .map_err(|e| self.failure(e))?;

        if !response.status().is_success() {
            return Err(self.status_failure(response).await);
        }
        response.json().await.map_err(|e| self.failure(e))
    }

    fn name(&self) -> &str {
        "http"
    }
}
