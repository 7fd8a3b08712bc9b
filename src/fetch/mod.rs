//! Per-item acquisition: retries, timeouts, pacing and failure substitution.
//!
//! - [`retry`]: generic retry loop with linear backoff
//! - [`rate_limit`]: randomized delay between acquisitions
//! - [`resilient`]: remote downloads wrapped in both of the above, falling
//!   back to a `<name>.error.txt` placeholder instead of failing the export

pub mod rate_limit;
pub mod resilient;
pub mod retry;

pub use rate_limit::RateLimiter;
pub use resilient::{AcquisitionFailure, ResilientFetcher, Resolution};
pub use retry::{RetryOutcome, RetryPolicy, retry_with_backoff};
