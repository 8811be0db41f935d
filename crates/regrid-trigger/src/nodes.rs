//! Ready-node-set provider.

use thiserror::Error;

use regrid_state::{NodeRecord, NodeRef, ResourceCache};

/// Errors from a ready-node provider.
///
/// The cache-backed default cannot fail, but the contract is fallible:
/// providers backed by a remote inventory can, and those errors feed
/// the worker's rate-limited retry path.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// The provider could not produce a node set.
    #[error("ready node listing failed: {0}")]
    Provider(String),
}

/// Supplies the set of nodes a rebalance pass may target.
pub trait ReadyNodes: Send + Sync {
    fn list(&self, nodes: &ResourceCache<NodeRecord>) -> Result<Vec<NodeRef>, TriggerError>;
}

/// Default provider: every cached node whose conditions say ready.
///
/// Returns the set sorted by name so a traced pass is deterministic.
#[derive(Debug, Default)]
pub struct CachedReadyNodes;

impl ReadyNodes for CachedReadyNodes {
    fn list(&self, nodes: &ResourceCache<NodeRecord>) -> Result<Vec<NodeRef>, TriggerError> {
        let mut refs: Vec<NodeRef> = nodes
            .list()
            .into_iter()
            .filter(|(_, n)| n.is_ready())
            .map(|(_, n)| NodeRef::new(&n.name))
            .collect();
        refs.sort();
        Ok(refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regrid_state::{ConditionKind, ConditionStatus, NodeCondition, ResourceKey};
    use std::collections::HashMap;

    fn node(name: &str, ready: bool) -> NodeRecord {
        let status = if ready {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        };
        NodeRecord {
            name: name.to_string(),
            labels: HashMap::new(),
            conditions: vec![NodeCondition::new(ConditionKind::Ready, status)],
        }
    }

    #[test]
    fn lists_only_ready_nodes_sorted() {
        let cache = ResourceCache::new();
        for n in [node("n2", true), node("n1", true), node("n3", false)] {
            let key = ResourceKey::cluster_scoped(&n.name).unwrap();
            cache.insert(key, n);
        }

        let refs = CachedReadyNodes.list(&cache).unwrap();
        assert_eq!(refs, vec![NodeRef::new("n1"), NodeRef::new("n2")]);
    }

    #[test]
    fn empty_cache_lists_nothing() {
        let cache = ResourceCache::new();
        assert!(CachedReadyNodes.list(&cache).unwrap().is_empty());
    }
}
