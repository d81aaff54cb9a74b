//! Process-wide pacing for snapshot submissions
//!
//! One gate for every caller: whoever holds the lock waits out the interval,
//! so concurrent submitters are served one at a time in lock order. Under
//! sustained load a caller can wait several intervals.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The wait was abandoned because the caller cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rate limit wait cancelled")]
pub struct WaitCancelled;

/// Minimum-interval gate. Construct once and share through an `Arc`.
///
/// Timing uses tokio's clock, so tests can pause and advance it.
pub struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    /// Block until `min_interval` has passed since the previous permit
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), WaitCancelled> {
        let mut last = self.last_request.lock().await;

        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                debug!(
                    wait_ms = ready_at.duration_since(Instant::now()).as_millis() as u64,
                    "pacing submission"
                );
                tokio::select! {
                    _ = sleep_until(ready_at) => {}
                    _ = cancel.cancelled() => return Err(WaitCancelled),
                }
            }
        }

        *last = Some(Instant::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(10));
        let start = Instant::now();
        limiter.wait(&CancellationToken::new()).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_request_waits_interval() {
        let limiter = RateLimiter::new(Duration::from_secs(10));
        let cancel = CancellationToken::new();
        let start = Instant::now();
        limiter.wait(&cancel).await.unwrap();
        limiter.wait(&cancel).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_interval_passed() {
        let limiter = RateLimiter::new(Duration::from_secs(10));
        let cancel = CancellationToken::new();
        limiter.wait(&cancel).await.unwrap();
        tokio::time::advance(Duration::from_secs(12)).await;
        let start = Instant::now();
        limiter.wait(&cancel).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_across_tasks() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(10)));
        let start = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter.wait(&CancellationToken::new()).await.unwrap();
                    Instant::now()
                })
            })
            .collect();

        let mut times = Vec::new();
        for handle in handles {
            times.push(handle.await.unwrap());
        }
        times.sort();
        assert!(times[1] - times[0] >= Duration::from_secs(10));
        assert!(times[2] - times[1] >= Duration::from_secs(10));
        assert!(times[2] - start >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting() {
        let limiter = RateLimiter::new(Duration::from_secs(10));
        let cancel = CancellationToken::new();
        limiter.wait(&cancel).await.unwrap();

        cancel.cancel();
        assert_eq!(limiter.wait(&cancel).await, Err(WaitCancelled));
    }
}
