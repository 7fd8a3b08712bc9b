use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use super::{Fetch, FetchError, ResponseBody};

/// Connection-establishment limit; per-attempt deadlines are enforced above
/// this layer.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP fetcher for remote media
pub struct HttpFetcher {
    client: Client,
    transferred_bytes: Arc<AtomicU64>,
}

impl HttpFetcher {
    /// Create a new fetcher sending `user_agent` with every request
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            transferred_bytes: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Get total body bytes received from the network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    type Body = HttpBody;

    async fn fetch(&self, url: &str) -> Result<HttpBody, FetchError> {
        let resp = self.client.get(url).send().await?;

        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status().as_u16()));
        }
        trace!(url, status = resp.status().as_u16(), "response headers received");

        Ok(HttpBody {
            resp,
            transferred_bytes: Arc::clone(&self.transferred_bytes),
        })
    }
}

/// Unread body of a successful response
pub struct HttpBody {
    resp: Response,
    transferred_bytes: Arc<AtomicU64>,
}

#[async_trait]
impl ResponseBody for HttpBody {
    async fn into_bytes(self) -> Result<Bytes, FetchError> {
        let bytes = self
            .resp
            .bytes()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        self.transferred_bytes
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        Ok(bytes)
    }
}
