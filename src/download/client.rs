//! HTTP client wrapper for retrieving resources.
//!
//! [`HttpClient`] is the production [`ResourceClient`]: one GET per call, body
//! streamed into memory, non-2xx mapped to [`DownloadError::HttpStatus`].
//! Requests carry no cookies and no `Referer` header.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tracing::{debug, instrument};

use super::constants::{CONNECT_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS, USER_AGENT};
use super::error::DownloadError;

/// Retrieves the raw bytes behind a locator.
///
/// Implementations perform exactly one network attempt per call; retry lives
/// in the [`ResilientFetcher`](super::ResilientFetcher).
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Fetches `url` and returns the full response body.
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError>;
}

/// HTTP client for resource retrieval.
///
/// Created once and reused for every attempt so connections are pooled.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the default 30 second request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Network`] if the underlying client cannot be built.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    /// Creates a client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Network`] if the underlying client cannot be built.
    #[instrument(level = "debug")]
    pub fn with_timeout(request_timeout: Duration) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(request_timeout))
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .referer(false)
            .gzip(true)
            .build()
            .map_err(|e| DownloadError::network("<client>", e))?;
        Ok(Self { client })
    }

    /// Fetches `url` as text, used for listing pages.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`ResourceClient::get_bytes`].
    pub async fn get_text(&self, url: &str) -> Result<String, DownloadError> {
        let bytes = self.get_bytes(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[async_trait]
impl ResourceClient for HttpClient {
    #[instrument(skip(self), fields(url = %url))]
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| map_reqwest_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "non-success status");
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let mut body = Vec::with_capacity(
            response
                .content_length()
                .and_then(|len| usize::try_from(len).ok())
                .unwrap_or(0),
        );
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| map_reqwest_error(url, e))?;
            body.extend_from_slice(&chunk);
        }

        debug!(bytes = body.len(), "response body received");
        Ok(body)
    }
}

fn map_reqwest_error(url: &str, error: reqwest::Error) -> DownloadError {
    if error.is_timeout() {
        DownloadError::timeout(url)
    } else {
        DownloadError::network(url, error)
    }
}
