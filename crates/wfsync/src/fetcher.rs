//! Fetching workflow artifacts and secrets

use crate::config::FetcherConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use tracing::debug;

/// Fetches the raw bytes published at a URL.
///
/// One call is one network request. Callers own retry and caching.
#[async_trait]
pub trait SecretsFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// HTTP fetcher with a request timeout and a response size cap
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_response_bytes: usize,
}

impl HttpFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            max_response_bytes: config.max_response_bytes,
        })
    }

    fn request_error(url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl SecretsFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let too_large = || FetchError::TooLarge {
            url: url.to_string(),
            limit: self.max_response_bytes,
        };

        if let Some(length) = response.content_length() {
            if length > self.max_response_bytes as u64 {
                return Err(too_large());
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Self::request_error(url, e))?;
        if body.len() > self.max_response_bytes {
            return Err(too_large());
        }

        debug!(url = %url, bytes = body.len(), "Fetched artifact");
        Ok(body.to_vec())
    }
}

/// Adapts a closure into a [`SecretsFetcher`]
pub struct FnFetcher<F> {
    f: F,
}

impl<F> FnFetcher<F>
where
    F: Fn(&str) -> Result<Vec<u8>, FetchError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> SecretsFetcher for FnFetcher<F>
where
    F: Fn(&str) -> Result<Vec<u8>, FetchError> + Send + Sync,
{
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        (self.f)(url)
    }
}

impl<F> std::fmt::Debug for FnFetcher<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnFetcher").finish_non_exhaustive()
    }
}
