//! Request pacing for the EDINET API.
//!
//! EDINET applies service-side throttling to aggressive clients, so every
//! outbound request first passes through a shared [`RequestThrottle`] that
//! enforces a minimum interval between request starts. Concurrency is
//! bounded separately by the pipeline; the throttle only governs spacing.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Enforces a minimum interval between request starts.
///
/// Cloning is cheap and clones share the same limiter state, so a single
/// throttle can pace the index scanner and the package fetcher together.
#[derive(Clone)]
pub struct RequestThrottle {
    limiter: Arc<DirectLimiter>,
    min_interval: Duration,
}

impl RequestThrottle {
    /// Creates a throttle that releases at most one request per
    /// `min_interval`, with a burst allowance of `burst` immediate
    /// requests after an idle period.
    ///
    /// Intervals below one millisecond are clamped up to one millisecond.
    pub fn new(min_interval: Duration, burst: u32) -> Self {
        let min_interval = min_interval.max(Duration::from_millis(1));
        let burst = NonZeroU32::new(burst.max(1)).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(min_interval)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(burst);

        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            min_interval,
        }
    }

    /// Creates a throttle allowing `per_second` requests per second with
    /// no extra burst allowance.
    pub fn per_second(per_second: u32) -> Self {
        let per_second = per_second.max(1);
        Self::new(Duration::from_secs(1) / per_second, 1)
    }

    /// The configured minimum interval between request starts.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until the next request may start.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    /// Attempts to take a slot without waiting.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl fmt::Debug for RequestThrottle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestThrottle")
            .field("min_interval", &self.min_interval)
            .finish_non_exhaustive()
    }
}

impl Default for RequestThrottle {
    /// One request every 250 milliseconds, no burst.
    fn default() -> Self {
        Self::new(Duration::from_millis(250), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn burst_is_bounded() {
        let throttle = RequestThrottle::new(Duration::from_secs(10), 2);
        assert!(throttle.try_acquire());
        assert!(throttle.try_acquire());
        assert!(!throttle.try_acquire());
    }

    #[test]
    fn clones_share_state() {
        let throttle = RequestThrottle::new(Duration::from_secs(10), 1);
        let other = throttle.clone();
        assert!(throttle.try_acquire());
        assert!(!other.try_acquire());
    }

    #[tokio::test]
    async fn acquire_spaces_requests() {
        let throttle = RequestThrottle::new(Duration::from_millis(50), 1);
        let start = Instant::now();
        throttle.acquire().await;
        throttle.acquire().await;
        throttle.acquire().await;
        // Two paced waits after the initial free slot.
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[test]
    fn zero_interval_is_clamped() {
        let throttle = RequestThrottle::new(Duration::ZERO, 0);
        assert_eq!(throttle.min_interval(), Duration::from_millis(1));
        assert!(throttle.try_acquire());
    }
}
