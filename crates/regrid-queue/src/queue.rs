//! Deduplicating work queue.
//!
//! Identity is structural equality of the item. The queue tracks three
//! states per identity: pending (in the FIFO), dirty (needs processing),
//! and processing (handed to the consumer). An `add` while an equal item
//! is pending coalesces into it; an `add` while the item is being
//! processed marks it dirty so `done` re-queues it exactly once.
//!
//! Written for a single consumer: one wake permit is issued per
//! enqueue, which is exactly what the sequential worker loop needs.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

use tokio::sync::Notify;

struct Inner<T> {
    queue: VecDeque<T>,
    dirty: HashSet<T>,
    processing: HashSet<T>,
    shutting_down: bool,
}

/// Concurrent-producer, single-consumer dedup FIFO.
pub struct WorkQueue<T> {
    inner: Mutex<Inner<T>>,
    wake: Notify,
}

impl<T: Clone + Eq + Hash> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Eq + Hash> WorkQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                dirty: HashSet::new(),
                processing: HashSet::new(),
                shutting_down: false,
            }),
            wake: Notify::new(),
        }
    }

    /// Insert an item. No-op if an equal item is already pending, and
    /// after shutdown. Never blocks the caller.
    pub fn add(&self, item: T) {
        {
            let mut inner = self.lock();
            if inner.shutting_down {
                return;
            }
            if inner.dirty.contains(&item) {
                return;
            }
            inner.dirty.insert(item.clone());
            if inner.processing.contains(&item) {
                // Re-queued by `done` once the in-flight copy finishes.
                return;
            }
            inner.queue.push_back(item);
        }
        self.wake.notify_one();
    }

    /// Wait for the next item. Returns `None` once the queue has been
    /// shut down and drained.
    pub async fn get(&self) -> Option<T> {
        loop {
            let notified = self.wake.notified();
            {
                let mut inner = self.lock();
                if let Some(item) = inner.queue.pop_front() {
                    inner.dirty.remove(&item);
                    inner.processing.insert(item.clone());
                    return Some(item);
                }
                if inner.shutting_down {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Mark an item finished. Must be called after every `get`,
    /// regardless of processing outcome. Re-queues the item if it was
    /// re-added while in flight.
    pub fn done(&self, item: &T) {
        let requeued = {
            let mut inner = self.lock();
            inner.processing.remove(item);
            if inner.dirty.contains(item) {
                inner.queue.push_back(item.clone());
                true
            } else {
                false
            }
        };
        if requeued {
            self.wake.notify_one();
        }
    }

    /// Stop accepting new work and let `get` drain what is pending.
    pub fn shut_down(&self) {
        self.lock().shutting_down = true;
        self.wake.notify_one();
    }

    /// Number of pending (not yet dequeued) items.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Whether no items are pending.
    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// Whether `shut_down` has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn add_get_done_flow() {
        let q: WorkQueue<&str> = WorkQueue::new();
        q.add("a");
        assert_eq!(q.len(), 1);

        let item = q.get().await.unwrap();
        assert_eq!(item, "a");
        assert!(q.is_empty());

        q.done(&item);
        q.shut_down();
        assert_eq!(q.get().await, None);
    }

    #[tokio::test]
    async fn identical_pending_items_coalesce() {
        let q: WorkQueue<&str> = WorkQueue::new();
        q.add("tick");
        q.add("tick");
        q.add("tick");
        assert_eq!(q.len(), 1);

        let item = q.get().await.unwrap();
        q.done(&item);

        // Exactly one delivery.
        q.shut_down();
        assert_eq!(q.get().await, None);
    }

    #[tokio::test]
    async fn distinct_items_keep_fifo_order() {
        let q: WorkQueue<&str> = WorkQueue::new();
        q.add("a");
        q.add("b");

        assert_eq!(q.get().await, Some("a"));
        assert_eq!(q.get().await, Some("b"));
    }

    #[tokio::test]
    async fn add_during_processing_redelivers_once() {
        let q: WorkQueue<&str> = WorkQueue::new();
        q.add("a");
        let item = q.get().await.unwrap();

        // Re-added while in flight: not pending yet.
        q.add("a");
        q.add("a");
        assert!(q.is_empty());

        q.done(&item);
        assert_eq!(q.len(), 1);

        let again = q.get().await.unwrap();
        q.done(&again);

        q.shut_down();
        assert_eq!(q.get().await, None);
    }

    #[tokio::test]
    async fn get_blocks_until_work_arrives() {
        let q: Arc<WorkQueue<&str>> = Arc::new(WorkQueue::new());

        let blocked = tokio::time::timeout(Duration::from_millis(20), q.get()).await;
        assert!(blocked.is_err());

        let consumer = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.get().await })
        };
        q.add("a");
        assert_eq!(consumer.await.unwrap(), Some("a"));
    }

    #[tokio::test]
    async fn shutdown_drains_then_signals() {
        let q: WorkQueue<&str> = WorkQueue::new();
        q.add("a");
        q.add("b");
        q.shut_down();

        assert_eq!(q.get().await, Some("a"));
        q.done(&"a");
        assert_eq!(q.get().await, Some("b"));
        q.done(&"b");
        assert_eq!(q.get().await, None);
    }

    #[tokio::test]
    async fn add_after_shutdown_is_dropped() {
        let q: WorkQueue<&str> = WorkQueue::new();
        q.shut_down();
        q.add("late");
        assert_eq!(q.get().await, None);
    }

    #[tokio::test]
    async fn shutdown_wakes_blocked_consumer() {
        let q: Arc<WorkQueue<&str>> = Arc::new(WorkQueue::new());
        let consumer = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.get().await })
        };

        // Give the consumer a chance to block first.
        tokio::task::yield_now().await;
        q.shut_down();
        assert_eq!(consumer.await.unwrap(), None);
    }
}
