use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::retry::{RetryOutcome, RetryPolicy};
use crate::export::{EntryBody, ExportItem, ItemPayload, ReadyEntry};
use crate::io::{Fetch, FetchError, ResponseBody};

/// Remote content could not be obtained.
#[derive(Debug, Error)]
#[error("failed after {attempts} attempt(s): {source}")]
pub struct AcquisitionFailure {
    pub attempts: u32,
    pub source: FetchError,
}

/// What became of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Ready(ReadyEntry),
    /// The item failed; `entry` is the diagnostic placeholder to write instead.
    Substituted { entry: ReadyEntry, error: String },
}

/// Turns export items into bytes, retrying remote downloads and replacing
/// items that still fail with a diagnostic text entry.
///
/// Each attempt is bounded by `attempt_timeout`; reading the body of the
/// successful response is bounded separately by `decode_timeout`. A request
/// that times out is dropped along with its future, which aborts it; the
/// caller never observes a late completion.
pub struct ResilientFetcher<F> {
    fetcher: F,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    decode_timeout: Duration,
}

impl<F: Fetch> ResilientFetcher<F> {
    pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_DECODE_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            policy: RetryPolicy::default(),
            attempt_timeout: Self::DEFAULT_ATTEMPT_TIMEOUT,
            decode_timeout: Self::DEFAULT_DECODE_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeouts(mut self, attempt_timeout: Duration, decode_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self.decode_timeout = decode_timeout;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Download `url`, retrying per the policy.
    pub async fn acquire(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Bytes, AcquisitionFailure> {
        let outcome = self
            .policy
            .run(FetchError::is_retryable, |attempt| {
                self.attempt(url, attempt, cancel)
            })
            .await;

        let (body, attempts) = match outcome {
            RetryOutcome::Success { value, attempts } => (value, attempts),
            RetryOutcome::Exhausted { error, attempts } => {
                return Err(AcquisitionFailure {
                    attempts,
                    source: error,
                });
            }
        };

        let decoded = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            res = tokio::time::timeout(self.decode_timeout, body.into_bytes()) => {
                res.unwrap_or(Err(FetchError::DecodeTimeout(self.decode_timeout)))
            }
        };

        decoded.map_err(|source| AcquisitionFailure { attempts, source })
    }

    async fn attempt(
        &self,
        url: &str,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Result<F::Body, FetchError> {
        debug!(url, attempt, max_attempts = self.policy.max_attempts, "fetching");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            res = tokio::time::timeout(self.attempt_timeout, self.fetcher.fetch(url)) => {
                res.unwrap_or(Err(FetchError::Timeout(self.attempt_timeout)))
            }
        }
    }

    /// Resolve one item to framable bytes.
    ///
    /// Inline items are ready as they are. Remote items are downloaded; if
    /// that fails for good the result is a [`Resolution::Substituted`]
    /// carrying `<name>.error.txt` with the error and the URL.
    pub async fn resolve(&self, item: ExportItem, cancel: &CancellationToken) -> Resolution {
        let ExportItem {
            name,
            payload,
            modified,
        } = item;

        let body = match payload {
            ItemPayload::Text(text) => EntryBody::Bytes(Bytes::from(text)),
            ItemPayload::Blob(data) => EntryBody::Bytes(data),
            ItemPayload::Directory => EntryBody::Directory,
            ItemPayload::Remote(url) => {
                let started = tokio::time::Instant::now();
                match self.acquire(&url, cancel).await {
                    Ok(data) => {
                        info!(
                            item = %name,
                            bytes = data.len(),
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "downloaded"
                        );
                        EntryBody::Bytes(data)
                    }
                    Err(failure) => {
                        warn!(item = %name, %url, error = %failure, "download failed, substituting");
                        let message = format!(
                            "Download failed after {} attempt(s): {}\nURL: {}\n",
                            failure.attempts, failure.source, url
                        );
                        return Resolution::Substituted {
                            entry: ReadyEntry::diagnostic(&name, message),
                            error: failure.to_string(),
                        };
                    }
                }
            }
        };

        Resolution::Ready(ReadyEntry::new(name, body, modified))
    }
}
