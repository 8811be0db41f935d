//! Trigger policy — should a rebalance pass run now?

use tracing::debug;

use regrid_state::{NodeRecord, ResourceCache};

/// Decision function over the node cache.
///
/// Implementations must be pure reads: no side effects, safe to call
/// repeatedly with the cache being updated concurrently by its watcher.
pub trait TriggerPolicy: Send + Sync {
    fn should_fire(&self, nodes: &ResourceCache<NodeRecord>) -> bool;
}

/// Default policy: fire once the watched fleet has fully recovered.
///
/// A pass runs only when every watched node is ready and the fleet is at
/// least `min_ready` nodes large. Rebalancing onto a cluster that still
/// has unready nodes would move workloads onto churn.
pub struct ReadinessTrigger {
    min_ready: usize,
}

impl Default for ReadinessTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessTrigger {
    pub fn new() -> Self {
        Self { min_ready: 1 }
    }

    /// Require at least this many ready nodes before firing.
    pub fn with_min_ready(mut self, min_ready: usize) -> Self {
        self.min_ready = min_ready;
        self
    }
}

impl TriggerPolicy for ReadinessTrigger {
    fn should_fire(&self, nodes: &ResourceCache<NodeRecord>) -> bool {
        let records = nodes.list();
        let total = records.len();
        let ready = records.iter().filter(|(_, n)| n.is_ready()).count();

        let fire = ready == total && ready >= self.min_ready;
        debug!(ready, total, min_ready = self.min_ready, fire, "trigger evaluated");
        fire
    }
}
