//! Rate-limited retry queue.
//!
//! Composes the dedup [`WorkQueue`] with a [`RateLimiter`]: failed items
//! come back through `add_rate_limited`, which sleeps out the computed
//! backoff on a spawned task before re-adding. The caller owns the
//! max-retries policy via `num_requeues` and `forget`.

use std::hash::Hash;
use std::sync::Arc;

use tracing::trace;

use crate::queue::WorkQueue;
use crate::rate_limit::RateLimiter;

/// The queue held by the control loop.
pub struct RetryQueue<T> {
    queue: Arc<WorkQueue<T>>,
    limiter: RateLimiter<T>,
}

impl<T> RetryQueue<T>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
{
    /// Queue with the default rate-limiting policy.
    pub fn new() -> Arc<Self> {
        Self::with_limiter(RateLimiter::new())
    }

    /// Queue with a custom rate limiter.
    pub fn with_limiter(limiter: RateLimiter<T>) -> Arc<Self> {
        Arc::new(Self {
            queue: Arc::new(WorkQueue::new()),
            limiter,
        })
    }

    /// Insert an item immediately. Coalesces with a pending equal item.
    pub fn add(&self, item: T) {
        self.queue.add(item);
    }

    /// Re-queue a failed item after its computed backoff delay.
    pub fn add_rate_limited(&self, item: T) {
        let delay = self.limiter.when(&item);
        if delay.is_zero() {
            self.queue.add(item);
            return;
        }

        trace!(?delay, "delaying re-enqueue");
        let queue = Arc::clone(&self.queue);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(item);
        });
    }

    /// Wait for the next item; `None` once shut down and drained.
    pub async fn get(&self) -> Option<T> {
        self.queue.get().await
    }

    /// Mark an item finished. Required after every `get`.
    pub fn done(&self, item: &T) {
        self.queue.done(item);
    }

    /// Reset the retry counter for an item's identity.
    pub fn forget(&self, item: &T) {
        self.limiter.forget(item);
    }

    /// Current retry counter for an item's identity.
    pub fn num_requeues(&self, item: &T) -> u32 {
        self.limiter.num_requeues(item)
    }

    /// Stop accepting work and drain.
    pub fn shut_down(&self) {
        self.queue.shut_down();
    }

    /// Number of pending items.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether no items are pending.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
