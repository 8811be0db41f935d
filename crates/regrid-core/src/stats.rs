//! Engine counters.
//!
//! Dropped events in particular must stay observable: the retry cap is
//! a silent-drop policy, and these counters (plus the warn logs) are
//! how operators notice it happening.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Shared atomic counters updated by the worker loop.
#[derive(Debug, Default)]
pub struct EngineStats {
    events_processed: AtomicU64,
    passes_triggered: AtomicU64,
    retries: AtomicU64,
    events_dropped: AtomicU64,
}

impl EngineStats {
    pub fn record_processed(&self) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pass(&self) {
        self.passes_triggered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events_processed: self.events_processed.load(Ordering::Relaxed),
            passes_triggered: self.passes_triggered.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Serializable counter snapshot for the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub events_processed: u64,
    pub passes_triggered: u64,
    pub retries: u64,
    pub events_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_into_snapshot() {
        let stats = EngineStats::default();
        stats.record_processed();
        stats.record_processed();
        stats.record_pass();
        stats.record_retry();
        stats.record_drop();

        let snap = stats.snapshot();
        assert_eq!(snap.events_processed, 2);
        assert_eq!(snap.passes_triggered, 1);
        assert_eq!(snap.retries, 1);
        assert_eq!(snap.events_dropped, 1);
    }
}
