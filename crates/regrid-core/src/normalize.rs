//! Event normalization — watch callbacks and the timer callback.
//!
//! Each constructor closes over the queue handle and builds a fresh
//! [`Event`] value per notification. Producers never block: `add` is
//! non-blocking and coalesces with pending duplicates.

use std::sync::Arc;

use tracing::{debug, trace};

use regrid_queue::RetryQueue;
use regrid_state::{Keyed, NodeRecord, WorkloadSet};
use regrid_watch::{FireCallback, UpdateHandler};

use crate::event::Event;

/// Node update handler: emits a `NodeReady` event only on a false→true
/// readiness transition.
///
/// Healthy nodes push updates continuously; the transition filter is
/// what keeps the queue quiet in steady state. First observations (no
/// cached old record) emit nothing, and a record without a derivable
/// key is dropped — a later update will re-derive it.
pub fn node_update_handler(queue: Arc<RetryQueue<Event>>) -> UpdateHandler<NodeRecord> {
    Arc::new(move |old: Option<&NodeRecord>, new: &NodeRecord| {
        let Some(old) = old else {
            return;
        };
        if old.is_ready() || !new.is_ready() {
            return;
        }
        match new.resource_key() {
            Ok(key) => {
                debug!(%key, "node became ready");
                queue.add(Event::node_ready(key));
            }
            Err(err) => debug!(%err, "dropping node notification without a key"),
        }
    })
}

/// Workload-set update handler: emits on every update notification.
///
/// No transition filter; the worker decides what (if anything) to do
/// with these.
pub fn workload_set_update_handler(queue: Arc<RetryQueue<Event>>) -> UpdateHandler<WorkloadSet> {
    Arc::new(move |old: Option<&WorkloadSet>, new: &WorkloadSet| {
        if old.is_none() {
            return;
        }
        match new.resource_key() {
            Ok(key) => {
                trace!(%key, "workload set updated");
                queue.add(Event::workload_set_update(key));
            }
            Err(err) => debug!(%err, "dropping workload set notification without a key"),
        }
    })
}

/// Timer callback: emits a keyless `Tick` event per fire.
pub fn timer_callback(queue: Arc<RetryQueue<Event>>) -> FireCallback {
    Arc::new(move || {
        trace!("pass timer fired");
        queue.add(Event::tick());
    })
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

    fn workload_set(namespace: &str, name: &str, ready: u32) -> WorkloadSet {
        WorkloadSet {
            namespace: namespace.to_string(),
            name: name.to_string(),
            labels: HashMap::new(),
            desired_replicas: 3,
            ready_replicas: ready,
        }
    }

    async fn drain(queue: &Arc<RetryQueue<Event>>) -> Vec<Event> {
        queue.shut_down();
        let mut events = Vec::new();
        while let Some(event) = queue.get().await {
            queue.done(&event);
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn emits_only_on_ready_transition() {
        let queue = RetryQueue::new();
        let handler = node_update_handler(Arc::clone(&queue));

        handler(Some(&node("n1", false)), &node("n1", true));

        let events = drain(&queue).await;
        let key = ResourceKey::cluster_scoped("n1").unwrap();
        assert_eq!(events, vec![Event::node_ready(key)]);
    }

    #[tokio::test]
    async fn steady_state_updates_emit_nothing() {
        let queue = RetryQueue::new();
        let handler = node_update_handler(Arc::clone(&queue));

        handler(Some(&node("n1", true)), &node("n1", true));
        handler(Some(&node("n1", true)), &node("n1", false));
        handler(Some(&node("n1", false)), &node("n1", false));

        assert!(drain(&queue).await.is_empty());
    }

    #[tokio::test]
    async fn first_observation_emits_nothing() {
        let queue = RetryQueue::new();
        let handler = node_update_handler(Arc::clone(&queue));

        handler(None, &node("n1", true));

        assert!(drain(&queue).await.is_empty());
    }

    #[tokio::test]
    async fn unnamed_node_is_dropped() {
        let queue = RetryQueue::new();
        let handler = node_update_handler(Arc::clone(&queue));

        handler(Some(&node("", false)), &node("", true));

        assert!(drain(&queue).await.is_empty());
    }

    #[tokio::test]
    async fn repeated_transitions_of_one_node_coalesce() {
        let queue = RetryQueue::new();
        let handler = node_update_handler(Arc::clone(&queue));

        // Flapping node: two recoveries before the worker drains.
        handler(Some(&node("n1", false)), &node("n1", true));
        handler(Some(&node("n1", false)), &node("n1", true));

        assert_eq!(drain(&queue).await.len(), 1);
    }

    #[tokio::test]
    async fn workload_set_updates_emit_unconditionally() {
        let queue = RetryQueue::new();
        let handler = workload_set_update_handler(Arc::clone(&queue));

        handler(
            Some(&workload_set("default", "api", 1)),
            &workload_set("default", "api", 2),
        );

        let events = drain(&queue).await;
        let key = ResourceKey::namespaced("default", "api").unwrap();
        assert_eq!(events, vec![Event::workload_set_update(key)]);
    }

    #[tokio::test]
    async fn workload_set_add_emits_nothing() {
        let queue = RetryQueue::new();
        let handler = workload_set_update_handler(Arc::clone(&queue));

        handler(None, &workload_set("default", "api", 3));

        assert!(drain(&queue).await.is_empty());
    }

    #[tokio::test]
    async fn timer_ticks_enqueue_and_coalesce() {
        let queue = RetryQueue::new();
        let on_fire = timer_callback(Arc::clone(&queue));

        on_fire();
        on_fire();

        assert_eq!(drain(&queue).await, vec![Event::tick()]);
    }
}
