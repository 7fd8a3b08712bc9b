use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tracing::trace;

use crate::export::ItemKind;

/// Randomized pacing between successive acquisitions.
///
/// After a remote download the next acquisition waits
/// `remote_base × (0.5 + U[0,1))`; after an inline blob it waits
/// `blob_base × U[0,1)`; after inline text a fixed `text_delay`. Directory
/// entries are not paced.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    remote_base: Duration,
    blob_base: Duration,
    text_delay: Duration,
    rng: StdRng,
}

impl RateLimiter {
    pub fn new(remote_base: Duration, blob_base: Duration, text_delay: Duration) -> Self {
        Self::with_rng(remote_base, blob_base, text_delay, StdRng::from_os_rng())
    }

    /// Deterministic jitter, for reproducible runs.
    pub fn seeded(remote_base: Duration, blob_base: Duration, text_delay: Duration, seed: u64) -> Self {
        Self::with_rng(remote_base, blob_base, text_delay, StdRng::seed_from_u64(seed))
    }

    /// A limiter that never waits.
    pub fn disabled() -> Self {
        Self::seeded(Duration::ZERO, Duration::ZERO, Duration::ZERO, 0)
    }

    fn with_rng(remote_base: Duration, blob_base: Duration, text_delay: Duration, rng: StdRng) -> Self {
        Self {
            remote_base,
            blob_base,
            text_delay,
            rng,
        }
    }

    /// Draw the pause that should follow an item of `kind`.
    pub fn delay_after(&mut self, kind: ItemKind) -> Duration {
        match kind {
            ItemKind::Remote => self.remote_base.mul_f64(0.5 + self.rng.random::<f64>()),
            ItemKind::Blob => self.blob_base.mul_f64(self.rng.random::<f64>()),
            ItemKind::Text => self.text_delay,
            ItemKind::Directory => Duration::ZERO,
        }
    }

    /// Sleep for [`delay_after`](Self::delay_after)`(kind)`.
    pub async fn pause_after(&mut self, kind: ItemKind) -> Duration {
        let delay = self.delay_after(kind);
        if !delay.is_zero() {
            trace!(?kind, delay_ms = delay.as_millis() as u64, "pacing");
            tokio::time::sleep(delay).await;
        }
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(seed: u64) -> RateLimiter {
        RateLimiter::seeded(
            Duration::from_millis(1000),
            Duration::from_millis(400),
            Duration::from_millis(10),
            seed,
        )
    }

    #[test]
    fn remote_delay_stays_within_half_to_one_and_a_half_base() {
        let mut limiter = limiter(7);
        for _ in 0..1000 {
            let d = limiter.delay_after(ItemKind::Remote);
            assert!(d >= Duration::from_millis(500), "{d:?}");
            assert!(d < Duration::from_millis(1500), "{d:?}");
        }
    }

    #[test]
    fn blob_delay_is_below_base() {
        let mut limiter = limiter(11);
        for _ in 0..1000 {
            assert!(limiter.delay_after(ItemKind::Blob) < Duration::from_millis(400));
        }
    }

    #[test]
    fn text_and_directory_delays_are_fixed() {
        let mut limiter = limiter(3);
        assert_eq!(limiter.delay_after(ItemKind::Text), Duration::from_millis(10));
        assert_eq!(limiter.delay_after(ItemKind::Directory), Duration::ZERO);
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = limiter(42);
        let mut b = limiter(42);
        for _ in 0..10 {
            assert_eq!(a.delay_after(ItemKind::Remote), b.delay_after(ItemKind::Remote));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_limiter_does_not_sleep() {
        let mut limiter = RateLimiter::disabled();
        let start = tokio::time::Instant::now();
        assert_eq!(limiter.pause_after(ItemKind::Remote).await, Duration::ZERO);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
