//! Domain types observed from the cluster.
//!
//! These records mirror what the external watch sources report: node
//! status with a condition list, and workload-set replica counts. All
//! types are serializable so they can travel through the report API.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::key::{KeyError, Keyed, ResourceKey};

/// Name of a node in the cluster.
pub type NodeName = String;

// ── Nodes ──────────────────────────────────────────────────────────

/// Status condition kinds a node can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    Ready,
    MemoryPressure,
    DiskPressure,
    NetworkUnavailable,
}

/// Tri-state status of a single condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// One entry in a node's condition list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCondition {
    pub kind: ConditionKind,
    pub status: ConditionStatus,
}

impl NodeCondition {
    pub fn new(kind: ConditionKind, status: ConditionStatus) -> Self {
        Self { kind, status }
    }
}

/// Observed state of a cluster node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: NodeName,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub conditions: Vec<NodeCondition>,
}

impl NodeRecord {
    /// A node is ready iff it carries a `Ready` condition with status `True`.
    pub fn is_ready(&self) -> bool {
        self.conditions
            .iter()
            .any(|c| c.kind == ConditionKind::Ready && c.status == ConditionStatus::True)
    }
}

impl Keyed for NodeRecord {
    fn resource_key(&self) -> Result<ResourceKey, KeyError> {
        ResourceKey::cluster_scoped(&self.name)
    }
}

/// Reference to a ready node, handed to the rebalance pass stage.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef {
    pub name: NodeName,
}

impl NodeRef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

// ── Workload sets ──────────────────────────────────────────────────

/// Observed state of a workload-set controller (replica-set equivalent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSet {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    pub desired_replicas: u32,
    pub ready_replicas: u32,
}

impl WorkloadSet {
    /// Whether every desired replica is ready.
    pub fn is_recovered(&self) -> bool {
        self.ready_replicas >= self.desired_replicas
    }
}

impl Keyed for WorkloadSet {
    fn resource_key(&self) -> Result<ResourceKey, KeyError> {
        ResourceKey::namespaced(&self.namespace, &self.name)
    }
}

// ── Label selectors ────────────────────────────────────────────────

/// One `key=value` or `key!=value` term of a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LabelTerm {
    Eq { key: String, value: String },
    NotEq { key: String, value: String },
}

/// Equality-based label selector, e.g. `role=worker,zone!=b`.
///
/// The empty selector matches everything. Owned by whatever constructs
/// the node feed; the core never filters by labels itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelSelector {
    terms: Vec<LabelTerm>,
}

impl LabelSelector {
    /// Parse a selector expression. Terms are comma-separated.
    pub fn parse(expr: &str) -> Result<Self, KeyError> {
        let mut terms = Vec::new();
        for raw in expr.split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            if let Some((key, value)) = raw.split_once("!=") {
                terms.push(LabelTerm::NotEq {
                    key: key.trim().to_string(),
                    value: value.trim().to_string(),
                });
            } else if let Some((key, value)) = raw.split_once('=') {
                terms.push(LabelTerm::Eq {
                    key: key.trim().to_string(),
                    value: value.trim().to_string(),
                });
            } else {
                return Err(KeyError::Malformed(raw.to_string()));
            }
        }
        Ok(Self { terms })
    }

    /// Whether the given label map satisfies every term.
    pub fn matches(&self, labels: &HashMap<String, String>) -> bool {
        self.terms.iter().all(|term| match term {
            LabelTerm::Eq { key, value } => labels.get(key) == Some(value),
            LabelTerm::NotEq { key, value } => labels.get(key) != Some(value),
        })
    }

    /// Whether this selector has no terms (matches everything).
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn node_with_conditions(name: &str, conditions: Vec<NodeCondition>) -> NodeRecord {
        NodeRecord {
            name: name.to_string(),
            labels: HashMap::new(),
            conditions,
        }
    }

    #[test]
    fn ready_requires_true_ready_condition() {
        let ready = node_with_conditions(
            "n1",
            vec![NodeCondition::new(ConditionKind::Ready, ConditionStatus::True)],
        );
        assert!(ready.is_ready());

        let not_ready = node_with_conditions(
            "n2",
            vec![NodeCondition::new(ConditionKind::Ready, ConditionStatus::False)],
        );
        assert!(!not_ready.is_ready());

        let unknown = node_with_conditions(
            "n3",
            vec![NodeCondition::new(ConditionKind::Ready, ConditionStatus::Unknown)],
        );
        assert!(!unknown.is_ready());
    }

    #[test]
    fn other_conditions_do_not_imply_ready() {
        let node = node_with_conditions(
            "n1",
            vec![NodeCondition::new(
                ConditionKind::MemoryPressure,
                ConditionStatus::True,
            )],
        );
        assert!(!node.is_ready());
    }

    #[test]
    fn no_conditions_means_not_ready() {
        assert!(!node_with_conditions("n1", Vec::new()).is_ready());
    }

    #[test]
    fn node_key_is_cluster_scoped() {
        let node = node_with_conditions("n1", Vec::new());
        assert_eq!(node.resource_key().unwrap().to_string(), "n1");

        let unnamed = node_with_conditions("", Vec::new());
        assert_eq!(unnamed.resource_key(), Err(KeyError::EmptyName));
    }

    #[test]
    fn workload_set_key_is_namespaced() {
        let ws = WorkloadSet {
            namespace: "default".to_string(),
            name: "api".to_string(),
            labels: HashMap::new(),
            desired_replicas: 3,
            ready_replicas: 3,
        };
        assert_eq!(ws.resource_key().unwrap().to_string(), "default/api");
        assert!(ws.is_recovered());
    }

    #[test]
    fn selector_equality_terms() {
        let sel = LabelSelector::parse("role=worker").unwrap();
        assert!(sel.matches(&labels(&[("role", "worker")])));
        assert!(!sel.matches(&labels(&[("role", "control")])));
        assert!(!sel.matches(&labels(&[])));
    }

    #[test]
    fn selector_inequality_terms() {
        let sel = LabelSelector::parse("zone!=b").unwrap();
        assert!(sel.matches(&labels(&[("zone", "a")])));
        assert!(sel.matches(&labels(&[])));
        assert!(!sel.matches(&labels(&[("zone", "b")])));
    }

    #[test]
    fn selector_combines_terms() {
        let sel = LabelSelector::parse("role=worker, zone!=b").unwrap();
        assert!(sel.matches(&labels(&[("role", "worker"), ("zone", "a")])));
        assert!(!sel.matches(&labels(&[("role", "worker"), ("zone", "b")])));
    }

    #[test]
    fn empty_selector_matches_everything() {
        let sel = LabelSelector::parse("").unwrap();
        assert!(sel.is_empty());
        assert!(sel.matches(&labels(&[("anything", "at-all")])));
    }

    #[test]
    fn selector_rejects_bare_terms() {
        assert!(LabelSelector::parse("role").is_err());
    }
}
