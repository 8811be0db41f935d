//! Resource identity — the `namespace/name` key scheme.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while deriving or parsing a resource key.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    /// The object has no name, so no key can be derived.
    #[error("resource has an empty name")]
    EmptyName,

    /// The key string has an empty segment or too many separators.
    #[error("malformed key: {0:?}")]
    Malformed(String),
}

/// Identity of a watched object: an optional namespace plus a name.
///
/// Cluster-scoped objects (nodes) have no namespace and display as the
/// bare name; namespaced objects display as `namespace/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceKey {
    /// Key for a cluster-scoped object.
    pub fn cluster_scoped(name: &str) -> Result<Self, KeyError> {
        if name.is_empty() {
            return Err(KeyError::EmptyName);
        }
        Ok(Self {
            namespace: None,
            name: name.to_string(),
        })
    }

    /// Key for a namespaced object.
    pub fn namespaced(namespace: &str, name: &str) -> Result<Self, KeyError> {
        if name.is_empty() {
            return Err(KeyError::EmptyName);
        }
        if namespace.is_empty() {
            return Err(KeyError::Malformed(format!("/{name}")));
        }
        Ok(Self {
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        })
    }

    /// Parse a key from its display form (`name` or `namespace/name`).
    pub fn parse(s: &str) -> Result<Self, KeyError> {
        match s.split_once('/') {
            None => Self::cluster_scoped(s),
            Some((namespace, name)) => {
                if name.contains('/') {
                    return Err(KeyError::Malformed(s.to_string()));
                }
                Self::namespaced(namespace, name)
            }
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}/{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Types that can derive their own resource key.
///
/// Derivation is fallible: a record reported without a name has no
/// identity and the notification carrying it is dropped by the caller.
pub trait Keyed {
    fn resource_key(&self) -> Result<ResourceKey, KeyError>;
}
