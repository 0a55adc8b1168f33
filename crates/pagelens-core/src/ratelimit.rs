//! Token-bucket rate limiter for outbound provider calls.
//!
//! Refill is lazy: every consume attempt tops the bucket up for the time
//! elapsed since the previous attempt, capped at capacity. There is no
//! background timer and no fairness between waiters.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Wait between attempts when the bucket never refills.
const ZERO_RATE_RETRY: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Thread-safe token bucket.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    refill_rate: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a full bucket holding `capacity` tokens, refilled at
    /// `refill_rate` tokens per second.
    pub fn new(refill_rate: f64, capacity: f64) -> Self {
        Self {
            capacity,
            refill_rate,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Take `tokens` from the bucket if that many are available right now.
    ///
    /// Never waits. Returns `false` and leaves the level untouched when the
    /// bucket is short.
    pub fn consume(&self, tokens: f64) -> bool {
        self.consume_at(tokens, Instant::now())
    }

    /// Take `tokens`, sleeping cooperatively between attempts until they fit.
    ///
    /// The wait between attempts is one refill period (`1 / refill_rate`).
    /// A request larger than capacity never succeeds; callers size requests
    /// accordingly.
    pub async fn consume_async(&self, tokens: f64) {
        let interval = self.retry_interval();
        while !self.consume(tokens) {
            tokio::time::sleep(interval).await;
        }
    }

    /// Current level after refilling for elapsed time.
    pub fn available(&self) -> f64 {
        let mut bucket = self.lock();
        self.refill(&mut bucket, Instant::now());
        bucket.tokens
    }

    fn consume_at(&self, tokens: f64, now: Instant) -> bool {
        let mut bucket = self.lock();
        self.refill(&mut bucket, now);
        if bucket.tokens >= tokens {
            bucket.tokens -= tokens;
            true
        } else {
            false
        }
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        bucket.last_refill = now;
    }

    fn retry_interval(&self) -> Duration {
        if self.refill_rate > 0.0 {
            Duration::from_secs_f64(1.0 / self.refill_rate)
        } else {
            ZERO_RATE_RETRY
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Bucket> {
        // The critical section cannot panic, so a poisoned lock still holds
        // a consistent bucket.
        self.bucket
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
