//! Transport for the raw schedule document
//!
//! [`ScheduleTransport`] is the network boundary of the fetcher: it returns
//! the document body untouched and knows nothing about its shape.
//! [`HttpTransport`] requests `GET {base_url}/screen?screen={screen_id}`.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors reaching the schedule source
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-200 response
    #[error("Unexpected status: {0}")]
    Status(u16),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Any other transport failure (used by custom transports)
    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// Retrieves the raw schedule document for a screen
#[async_trait]
pub trait ScheduleTransport: Send + Sync {
    async fn fetch(&self, screen_id: &str) -> Result<String, TransportError>;
}

/// Schedule transport over HTTP
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Prefix of the schedule API
    base_url: Url,
}

impl HttpTransport {
    /// Create a transport with a 30 second request timeout
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidUrl` for an unparseable base URL and
    /// `TransportError::Http` if the HTTP client cannot be created
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create a transport with a custom request timeout
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidUrl` for an unparseable base URL and
    /// `TransportError::Http` if the HTTP client cannot be created
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let base_url =
            Url::parse(base_url).map_err(|e| TransportError::InvalidUrl(format!("{base_url}: {e}")))?;
        let client = Client::builder().timeout(timeout).gzip(true).build()?;

        Ok(Self { client, base_url })
    }

    /// URL of the schedule document for `screen_id`
    pub fn schedule_url(&self, screen_id: &str) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| TransportError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().push("screen");
        }
        url.query_pairs_mut().append_pair("screen", screen_id);
        Ok(url)
    }
}

#[async_trait]
impl ScheduleTransport for HttpTransport {
    async fn fetch(&self, screen_id: &str) -> Result<String, TransportError> {
        let url = self.schedule_url(screen_id)?;
        tracing::debug!(url = %url, "Requesting schedule document");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Http(e)
            }
        })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(TransportError::Status(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}
