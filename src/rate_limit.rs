//! Per-provider token bucket.
//!
//! Each provider gets one bucket holding up to `max_rpm` tokens that refills
//! continuously at `max_rpm` tokens per minute. A request takes one token;
//! when the bucket is empty the calling task sleeps until the next token
//! arrives, while tasks for other providers keep running.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self, capacity: f64, per_second: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * per_second).min(capacity);
        self.last_refill = now;
    }
}

#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    per_second: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// A full bucket admitting `max_rpm` requests per minute. `max_rpm` is
    /// clamped to at least one.
    pub fn per_minute(max_rpm: u32) -> Self {
        let capacity = f64::from(max_rpm.max(1));
        Self {
            capacity,
            per_second: capacity / 60.0,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Waits until a token is available and takes it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                state.refill(self.capacity, self.per_second);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - state.tokens) / self.per_second)
            };

            trace!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Tokens currently available, after refilling.
    pub async fn available(&self) -> f64 {
        let mut state = self.state.lock().await;
        state.refill(self.capacity, self.per_second);
        state.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_acquire_within_capacity_does_not_wait() {
        let bucket = TokenBucket::per_minute(3);
        let start = Instant::now();

        for _ in 0..3 {
            bucket.acquire().await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_beyond_capacity_waits_for_refill() {
        let bucket = TokenBucket::per_minute(60);
        let start = Instant::now();

        for _ in 0..61 {
            bucket.acquire().await;
        }

        // One token refills every second at 60 rpm.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(999), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_is_capped_at_capacity() {
        let bucket = TokenBucket::per_minute(2);
        bucket.acquire().await;

        tokio::time::advance(Duration::from_secs(600)).await;

        assert_eq!(bucket.available().await, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_rpm_is_clamped() {
        let bucket = TokenBucket::per_minute(0);
        bucket.acquire().await;
        assert!(bucket.available().await < 1.0);
    }
}
