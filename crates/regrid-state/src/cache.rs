//! Shared in-memory resource cache.
//!
//! Each watcher owns one cache and is its only writer; the event
//! normalizer, trigger policy, and ready-node provider read it
//! concurrently. The handle is `Clone + Send + Sync` (an `Arc` inside),
//! matching the single-writer, many-reader model of the control loop.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::key::ResourceKey;

/// Keyed snapshot of one resource kind.
#[derive(Debug, Default)]
pub struct ResourceCache<T> {
    inner: Arc<RwLock<HashMap<ResourceKey, T>>>,
}

impl<T> Clone for ResourceCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> ResourceCache<T> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert or update a record, returning the previous value if any.
    pub fn insert(&self, key: ResourceKey, value: T) -> Option<T> {
        self.write().insert(key, value)
    }

    /// Remove a record, returning it if it existed.
    pub fn remove(&self, key: &ResourceKey) -> Option<T> {
        self.write().remove(key)
    }

    /// Snapshot lookup by key.
    pub fn get(&self, key: &ResourceKey) -> Option<T> {
        self.read().get(key).cloned()
    }

    /// Snapshot of all records.
    pub fn list(&self) -> Vec<(ResourceKey, T)> {
        self.read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Replace the entire contents with an initial list.
    pub fn replace_all(&self, items: Vec<(ResourceKey, T)>) {
        let mut map = self.write();
        map.clear();
        map.extend(items);
    }

    /// Number of records currently cached.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the cache holds no records.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ResourceKey, T>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ResourceKey, T>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
