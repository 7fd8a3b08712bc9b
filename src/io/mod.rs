mod http;

pub use http::HttpFetcher;

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

/// Why a single acquisition attempt (or its decode step) failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("reading response body timed out after {0:?}")]
    DecodeTimeout(Duration),

    #[error("reading response body failed: {0}")]
    Decode(String),

    #[error("cancelled")]
    Cancelled,
}

impl FetchError {
    /// Cancellation ends the acquisition; everything else may be retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::Cancelled)
    }
}

/// One remote acquisition attempt: issue the request and accept only 2xx.
///
/// The returned body has not been read yet; turning it into bytes is a
/// separate step ([`ResponseBody::into_bytes`]) with its own time budget.
#[async_trait]
pub trait Fetch: Send + Sync {
    type Body: ResponseBody;

    async fn fetch(&self, url: &str) -> Result<Self::Body, FetchError>;
}

/// A response whose body can be drained into memory.
#[async_trait]
pub trait ResponseBody: Send {
    async fn into_bytes(self) -> Result<Bytes, FetchError>;
}

/// Already-buffered bodies decode to themselves.
#[async_trait]
impl ResponseBody for Bytes {
    async fn into_bytes(self) -> Result<Bytes, FetchError> {
        Ok(self)
    }
}
