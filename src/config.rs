use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::export::Exporter;
use crate::fetch::{RateLimiter, ResilientFetcher, RetryPolicy};
use crate::io::Fetch;

/// Tunables for an export run.
///
/// Read from an optional TOML file; every field falls back to its default,
/// and command-line flags override whatever the file says.
///
/// ```toml
/// max_attempts = 5
/// remote_rate_ms = 1000
/// overall_timeout_secs = 600
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub attempt_timeout_ms: u64,
    pub decode_timeout_ms: u64,
    pub overall_timeout_secs: u64,
    /// Base pause after a remote download, jittered to 0.5x..1.5x.
    pub remote_rate_ms: u64,
    /// Upper bound of the pause after an inline blob.
    pub blob_rate_ms: u64,
    /// Fixed pause after inline text.
    pub text_delay_ms: u64,
    pub user_agent: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_base_delay_ms: 1000,
            attempt_timeout_ms: 5000,
            decode_timeout_ms: 10_000,
            overall_timeout_secs: 180,
            remote_rate_ms: 500,
            blob_rate_ms: 500,
            text_delay_ms: 10,
            user_agent: concat!("feedzip/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ExportConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_base_delay_ms))
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(
            Duration::from_millis(self.remote_rate_ms),
            Duration::from_millis(self.blob_rate_ms),
            Duration::from_millis(self.text_delay_ms),
        )
    }

    pub fn resilient_fetcher<F: Fetch>(&self, fetcher: F) -> ResilientFetcher<F> {
        ResilientFetcher::new(fetcher)
            .with_policy(self.retry_policy())
            .with_timeouts(
                Duration::from_millis(self.attempt_timeout_ms),
                Duration::from_millis(self.decode_timeout_ms),
            )
    }

    /// An exporter wired up with every setting in this config.
    pub fn exporter<F: Fetch>(&self, fetcher: F) -> Exporter<F> {
        Exporter::new(self.resilient_fetcher(fetcher), self.rate_limiter())
            .with_overall_timeout(Duration::from_secs(self.overall_timeout_secs))
    }
}
