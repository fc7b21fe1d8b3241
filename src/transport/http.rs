//! `reqwest`-backed [`Transport`].

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::{Client, ClientBuilder};
use tokio_util::io::StreamReader;
use tracing::{debug, instrument};
use url::Url;

use super::{ResponseHead, StreamingResponse, Transport};
use crate::transfer::TransferError;

/// Default connect timeout (30 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,
    /// Maximum idle time between body reads. `None` waits indefinitely;
    /// callers then rely on cancellation to stop a hung transfer.
    pub read_timeout: Option<Duration>,
    /// Value sent in the `User-Agent` header.
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: None,
            user_agent: default_user_agent(),
        }
    }
}

/// Default User-Agent identifying the tool and its version.
#[must_use]
pub fn default_user_agent() -> String {
    format!("any-downloader/{}", env!("CARGO_PKG_VERSION"))
}

/// HTTP transport over a pooled `reqwest` client.
///
/// Create once and share: clones are cheap and reuse the connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport with default settings.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend or system configuration
    /// cannot be initialised.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_config(&HttpTransportConfig::default())
    }

    /// Creates a transport from explicit settings.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the client cannot be built.
    pub fn with_config(config: &HttpTransportConfig) -> Result<Self, reqwest::Error> {
        let mut builder = ClientBuilder::new()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone());
        if let Some(read_timeout) = config.read_timeout {
            builder = builder.read_timeout(read_timeout);
        }
        debug!(
            connect_timeout_secs = config.connect_timeout.as_secs(),
            read_timeout_secs = config.read_timeout.map(|d| d.as_secs()),
            "building HTTP transport"
        );
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Wraps an already configured client.
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    async fn fetch_headers(&self, url: &Url) -> Result<ResponseHead, TransferError> {
        let response = self
            .client
            .head(url.as_str())
            .send()
            .await
            .map_err(|e| TransferError::network(url.as_str(), e))?;

        debug!(status = response.status().as_u16(), "received headers");
        Ok(ResponseHead {
            status: response.status(),
            headers: response.headers().clone(),
        })
    }

    #[instrument(level = "debug", skip(self), fields(url = %url))]
    async fn fetch_stream(&self, url: &Url) -> Result<StreamingResponse, TransferError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| TransferError::network(url.as_str(), e))?;

        let head = ResponseHead {
            status: response.status(),
            headers: response.headers().clone(),
        };
        debug!(status = head.status.as_u16(), "response stream opened");

        let stream = Box::pin(response.bytes_stream().map_err(io::Error::other));
        Ok(StreamingResponse::new(
            head,
            Box::new(StreamReader::new(stream)),
        ))
    }
}
