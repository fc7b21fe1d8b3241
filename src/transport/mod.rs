//! HTTP capability consumed by the transfer engine.
//!
//! The engine needs exactly two operations from the network: a headers-only
//! fetch (to resolve the destination name and size) and a streaming fetch
//! (to copy the body). [`Transport`] exposes those two, [`HttpTransport`]
//! implements them with `reqwest`.
//!
//! A non-success status is *data*, not an error: transports return the
//! [`ResponseHead`] and the engine decides how to fail. Only network-level
//! failures come back as [`TransferError::Network`](crate::TransferError).

mod http;

pub use http::{DEFAULT_CONNECT_TIMEOUT, HttpTransport, HttpTransportConfig, default_user_agent};

use std::fmt;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{
    CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue,
};
use tokio::io::AsyncRead;
use url::Url;

use crate::transfer::TransferError;

/// Sequential, consumable response body.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Status line and headers of a response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
}

impl ResponseHead {
    /// Creates a head with the given status and no headers.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
        }
    }

    /// Adds a header, replacing any previous value for `name`.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Declared body length, if the server sent a parseable `Content-Length`.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.header_str(&CONTENT_LENGTH)
            .and_then(|value| value.trim().parse().ok())
    }

    /// Raw `Content-Type` value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(&CONTENT_TYPE)
    }

    /// Raw `Content-Disposition` value.
    #[must_use]
    pub fn content_disposition(&self) -> Option<&str> {
        self.header_str(&CONTENT_DISPOSITION)
    }

    fn header_str(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A response whose body has not been read yet.
pub struct StreamingResponse {
    /// Status and headers.
    pub head: ResponseHead,
    /// Body reader.
    pub body: ByteStream,
}

impl StreamingResponse {
    /// Pairs a head with a body reader.
    #[must_use]
    pub fn new(head: ResponseHead, body: ByteStream) -> Self {
        Self { head, body }
    }
}

impl fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}

/// The two HTTP operations the transfer engine performs.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches status and headers only; no body is downloaded.
    async fn fetch_headers(&self, url: &Url) -> Result<ResponseHead, TransferError>;

    /// Fetches status, headers and a body reader.
    async fn fetch_stream(&self, url: &Url) -> Result<StreamingResponse, TransferError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_length_parses_numeric_header() {
        let head = ResponseHead::new(StatusCode::OK)
            .with_header(CONTENT_LENGTH, HeaderValue::from_static("1024"));
        assert_eq!(head.content_length(), Some(1024));
    }

    #[test]
    fn test_content_length_missing_or_garbage_is_none() {
        assert_eq!(ResponseHead::new(StatusCode::OK).content_length(), None);
        let head = ResponseHead::new(StatusCode::OK)
            .with_header(CONTENT_LENGTH, HeaderValue::from_static("lots"));
        assert_eq!(head.content_length(), None);
    }

    #[test]
    fn test_header_accessors() {
        let head = ResponseHead::new(StatusCode::OK)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/pdf"))
            .with_header(
                CONTENT_DISPOSITION,
                HeaderValue::from_static("attachment; filename=\"a.pdf\""),
            );
        assert_eq!(head.content_type(), Some("application/pdf"));
        assert_eq!(head.content_disposition(), Some("attachment; filename=\"a.pdf\""));
        assert!(head.is_success());
    }

    #[test]
    fn test_is_success_false_for_server_error() {
        assert!(!ResponseHead::new(StatusCode::INTERNAL_SERVER_ERROR).is_success());
    }
}
