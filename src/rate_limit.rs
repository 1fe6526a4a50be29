//! Fixed-window throttle for calls to the remote translation service.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::config::RateLimitConfig;
use crate::error::{Result, VidsubError};

#[derive(Debug)]
struct Window {
    started_at: Instant,
    calls: u32,
}

/// Allows at most `max_calls` acquisitions per window of `period`.
///
/// `acquire` never fails once the limiter exists: when the current window is
/// used up the caller sleeps until the next one opens. Share it with `Arc`;
/// the window check and the increment happen under one lock.
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: u32,
    period: Duration,
    window: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(max_calls: u32, period: Duration) -> Result<Self> {
        if max_calls == 0 {
            return Err(VidsubError::Config(
                "Rate limit must allow at least one call per window".to_string(),
            ));
        }
        if period.is_zero() {
            return Err(VidsubError::Config(
                "Rate limit period must be longer than zero".to_string(),
            ));
        }

        Ok(Self {
            max_calls,
            period,
            window: Mutex::new(Window {
                started_at: Instant::now(),
                calls: 0,
            }),
        })
    }

    pub fn from_config(config: &RateLimitConfig) -> Result<Self> {
        Self::new(config.calls, Duration::from_secs(config.period_secs))
    }

    pub fn max_calls(&self) -> u32 {
        self.max_calls
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Reserve one call slot, sleeping until one is available.
    pub async fn acquire(&self) {
        let mut window = self.window.lock().await;

        let elapsed = window.started_at.elapsed();
        if elapsed >= self.period {
            window.started_at = Instant::now();
            window.calls = 0;
        } else if window.calls >= self.max_calls {
            let wait = self.period - elapsed;
            info!(
                wait_ms = wait.as_millis() as u64,
                "Rate limit of {} calls per {:?} reached, waiting",
                self.max_calls,
                self.period
            );
            // Holding the lock keeps later callers queued behind this one
            sleep(wait).await;
            window.started_at = Instant::now();
            window.calls = 0;
        }

        window.calls += 1;
        debug!("Rate limiter slot {}/{} taken", window.calls, self.max_calls);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_test::assert_err;

    #[test]
    fn rejects_degenerate_limits() {
        let err = assert_err!(RateLimiter::new(0, Duration::from_secs(60)));
        assert!(matches!(err, VidsubError::Config(_)));
        assert_err!(RateLimiter::new(3, Duration::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn calls_within_the_limit_do_not_wait() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60)).unwrap();
        let started = Instant::now();

        for _ in 0..3 {
            limiter.acquire().await;
        }

        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn call_past_the_limit_waits_for_the_next_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60)).unwrap();
        let started = Instant::now();

        for _ in 0..4 {
            limiter.acquire().await;
        }

        assert!(started.elapsed() >= Duration::from_secs(60));
        assert!(started.elapsed() < Duration::from_secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets_after_the_period() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10)).unwrap();
        limiter.acquire().await;
        limiter.acquire().await;

        sleep(Duration::from_secs(11)).await;
        let resumed = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;

        assert!(resumed.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn shared_limiter_throttles_concurrent_callers() {
        let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(30)).unwrap());
        let started = Instant::now();

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.acquire().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        // 5 calls at 2 per window need three windows
        assert!(started.elapsed() >= Duration::from_secs(60));
    }
}
