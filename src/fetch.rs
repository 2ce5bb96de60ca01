//! Upstream HTTP access.
//!
//! The pipeline only sees the [`Fetcher`] trait so tests can swap in canned
//! responses. [`HttpFetcher`] is the production implementation over
//! `reqwest`: one GET, no retries, body capped at `max_response_bytes`.

use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::util::truncate_bytes;

/// Errors that can occur while fetching an upstream document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code. The body is kept for diagnostics.
    #[error("HTTP error: status {status}")]
    HttpStatus { status: u16, body: String },
    /// Request exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the size limit
    #[error("Response too large (limit {limit} bytes)")]
    ResponseTooLarge { limit: usize },
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Response body was not UTF-8
    #[error("Response is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

impl FetchError {
    /// Response text that came with the failure, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            FetchError::HttpStatus { body, .. } if !body.is_empty() => Some(body),
            _ => None,
        }
    }
}

/// Extra request settings a source may need.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub headers: Vec<(String, String)>,
}

impl FetchOptions {
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Retrieves the text of an upstream URL.
pub trait Fetcher: Send + Sync {
    fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// `reqwest`-backed [`Fetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: usize,
    timeout: Option<Duration>,
}

impl HttpFetcher {
    pub fn new(
        user_agent: &str,
        max_bytes: usize,
        timeout: Option<Duration>,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            client,
            max_bytes,
            timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Self::new(
            &config.user_agent,
            config.max_response_bytes,
            config.fetch_timeout_secs.map(Duration::from_secs),
        )
    }

    async fn get(&self, url: &str, options: &FetchOptions) -> Result<String, FetchError> {
        let mut request = self.client.get(url);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            // Best effort: the body is only diagnostics at this point.
            let body = match read_limited_bytes(response, self.max_bytes).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "Could not read error response body");
                    String::new()
                }
            };
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = read_limited_bytes(response, self.max_bytes).await?;
        Ok(String::from_utf8(bytes)?)
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<String, FetchError> {
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.get(url, options))
                .await
                .map_err(|_| FetchError::Timeout(limit))?,
            None => self.get(url, options).await,
        };

        match &result {
            Ok(text) => tracing::debug!(url = %url, bytes = text.len(), "Fetched upstream"),
            Err(e) => tracing::warn!(
                url = %url,
                error = %e,
                body = truncate_bytes(e.body().unwrap_or(""), 200),
                "Upstream fetch failed"
            ),
        }
        result
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge { limit });
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge { limit });
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
