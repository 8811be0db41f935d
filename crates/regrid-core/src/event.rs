//! The uniform event record flowing through the queue.

use regrid_state::ResourceKey;

/// Semantic cause of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The periodic timer fired.
    Tick,
    /// A node transitioned from not-ready to ready.
    NodeReady,
    /// A workload set reported an update.
    WorkloadSetUpdate,
}

/// Coarse classification used by the worker to route an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    Timer,
    Node,
    WorkloadSet,
}

/// The unit of work in the queue.
///
/// Events are immutable values; every producer constructs a fresh one
/// per emission. Structural equality is the queue's coalescing identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Event {
    pub kind: EventKind,
    pub class: ResourceClass,
    /// Originating object, if any. Timer events carry no key; the key
    /// of a namespaced object carries its namespace.
    pub key: Option<ResourceKey>,
}

impl Event {
    /// A periodic timer tick.
    pub fn tick() -> Self {
        Self {
            kind: EventKind::Tick,
            class: ResourceClass::Timer,
            key: None,
        }
    }

    /// A node readiness recovery.
    pub fn node_ready(key: ResourceKey) -> Self {
        Self {
            kind: EventKind::NodeReady,
            class: ResourceClass::Node,
            key: Some(key),
        }
    }

    /// A workload set update.
    pub fn workload_set_update(key: ResourceKey) -> Self {
        Self {
            kind: EventKind::WorkloadSetUpdate,
            class: ResourceClass::WorkloadSet,
            key: Some(key),
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            EventKind::Tick => "tick",
            EventKind::NodeReady => "node-ready",
            EventKind::WorkloadSetUpdate => "workload-set-update",
        };
        match &self.key {
            Some(key) => write!(f, "{kind}({key})"),
            None => write!(f, "{kind}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_fill_class_and_key() {
        assert_eq!(Event::tick().class, ResourceClass::Timer);
        assert_eq!(Event::tick().key, None);

        let key = ResourceKey::cluster_scoped("n1").unwrap();
        let event = Event::node_ready(key.clone());
        assert_eq!(event.class, ResourceClass::Node);
        assert_eq!(event.key, Some(key));
    }

    #[test]
    fn identical_events_are_equal() {
        let key = ResourceKey::cluster_scoped("n1").unwrap();
        assert_eq!(Event::node_ready(key.clone()), Event::node_ready(key));
        assert_eq!(Event::tick(), Event::tick());
        assert_ne!(
            Event::tick(),
            Event::node_ready(ResourceKey::cluster_scoped("n1").unwrap())
        );
    }

    #[test]
    fn display_names_the_cause() {
        let key = ResourceKey::cluster_scoped("n1").unwrap();
        assert_eq!(Event::node_ready(key).to_string(), "node-ready(n1)");
        assert_eq!(Event::tick().to_string(), "tick");
    }
}
