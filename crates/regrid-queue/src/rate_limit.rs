//! Retry rate limiting.
//!
//! Two limiters are combined: a per-identity exponential backoff (the
//! delay doubles with each failure up to a cap, reset on success) and a
//! token bucket shared across all identities. The effective delay for a
//! re-enqueue is the larger of the two.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Default per-item backoff floor.
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(5);
/// Default per-item backoff ceiling.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(1000);
/// Default overall refill rate, items per second.
const DEFAULT_QPS: f64 = 10.0;
/// Default overall burst allowance.
const DEFAULT_BURST: u32 = 100;

/// Token bucket over all re-enqueues.
///
/// `reserve` always succeeds; when the bucket is empty it returns how
/// long the caller must wait, letting reservations run ahead of refill.
#[derive(Debug)]
pub struct TokenBucket {
    qps: f64,
    burst: f64,
    tokens: f64,
    refilled_at: Instant,
}

impl TokenBucket {
    pub fn new(qps: f64, burst: u32) -> Self {
        Self {
            qps,
            burst: f64::from(burst),
            tokens: f64::from(burst),
            refilled_at: Instant::now(),
        }
    }

    /// Take one token, returning the delay before it may be used.
    pub fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.refilled_at).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.qps).min(self.burst);
        self.refilled_at = now;

        self.tokens -= 1.0;
        if self.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-self.tokens / self.qps)
        }
    }
}

/// Combined per-item and overall rate limiter.
pub struct RateLimiter<T> {
    failures: Mutex<HashMap<T, u32>>,
    bucket: Mutex<TokenBucket>,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T: Clone + Eq + Hash> Default for RateLimiter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Eq + Hash> RateLimiter<T> {
    /// Limiter with the default policy: 5ms doubling to 1000s per item,
    /// 10 items/s with a burst of 100 overall.
    pub fn new() -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            bucket: Mutex::new(TokenBucket::new(DEFAULT_QPS, DEFAULT_BURST)),
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// Override the per-item backoff bounds.
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max;
        self
    }

    /// Override the overall token bucket.
    pub fn with_bucket(self, qps: f64, burst: u32) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(qps, burst)),
            ..self
        }
    }

    /// Record a failure for `item` and return the delay before its
    /// re-enqueue. The first failure waits the base delay; each further
    /// failure doubles it up to the cap.
    pub fn when(&self, item: &T) -> Duration {
        let exponent = {
            let mut failures = self.lock_failures();
            let count = failures.entry(item.clone()).or_insert(0);
            let exponent = *count;
            *count += 1;
            exponent
        };

        let backoff = self
            .base_delay
            .saturating_mul(1u32 << exponent.min(31))
            .min(self.max_delay);

        let bucket_delay = self
            .bucket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reserve();

        backoff.max(bucket_delay)
    }

    /// Number of failures recorded for `item` since its last `forget`.
    pub fn num_requeues(&self, item: &T) -> u32 {
        self.lock_failures().get(item).copied().unwrap_or(0)
    }

    /// Clear the failure history for `item`.
    pub fn forget(&self, item: &T) {
        self.lock_failures().remove(item);
    }

    fn lock_failures(&self) -> std::sync::MutexGuard<'_, HashMap<T, u32>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
