//! regrid-state — resource model and shared watch cache for Regrid.
//!
//! Holds the domain types observed from the cluster (nodes with their
//! condition lists, workload sets with replica counts), the key scheme
//! used to identify them, and the in-memory [`ResourceCache`] that each
//! watcher maintains and every other component reads.
//!
//! All state is in-memory only. Caches are rebuilt from the watchers'
//! initial list on restart; nothing is persisted.

pub mod cache;
pub mod key;
pub mod types;

pub use cache::ResourceCache;
pub use key::{KeyError, Keyed, ResourceKey};
pub use types::*;
