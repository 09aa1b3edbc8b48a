//! Minimum-spacing rate limiter shared by provider instances

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::Quota;
use std::num::NonZeroU32;
use std::time::Duration;

type DirectRateLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Enforces a minimum interval between outbound calls
///
/// Cloning an `Arc<RateLimiter>` into several providers makes them share one
/// budget. The first call passes immediately; each later call waits until
/// `min_interval` has elapsed since the previous one was admitted.
pub struct RateLimiter {
    limiter: Option<DirectRateLimiter>,
    min_interval: Duration,
}

impl RateLimiter {
    /// Creates a limiter; a zero interval disables limiting
    pub fn new(min_interval: Duration) -> Self {
        let limiter = Quota::with_period(min_interval)
            .map(|quota| quota.allow_burst(NonZeroU32::MIN))
            .map(DirectRateLimiter::direct);

        Self {
            limiter,
            min_interval,
        }
    }

    /// A limiter that never waits
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Waits until the next call is allowed
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("min_interval", &self.min_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn test_zero_interval_never_blocks() {
        let limiter = RateLimiter::unlimited();
        let start = Instant::now();
        for _ in 0..100 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_first_call_passes_immediately() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_wait_spaces_calls() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        let start = Instant::now();

        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;

        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn test_shared_between_tasks() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(40)));
        let start = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.wait().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_millis(70));
    }
}
