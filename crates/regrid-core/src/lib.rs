//! regrid-core — the trigger/queue engine.
//!
//! Watch notifications and timer ticks are normalized into a uniform
//! [`Event`] stream, buffered through a deduplicating rate-limited
//! queue, and drained by a single sequential worker that asks the
//! trigger policy whether a rebalance pass should run.
//!
//! # Architecture
//!
//! ```text
//! node watcher ──┐
//! set watcher ───┼── normalizer ──▶ retry queue ──▶ worker ──▶ trigger?
//! pass timer ────┘                                    │           │yes
//!                                                   done        ready
//!                                                               nodes ──▶ pass
//! ```
//!
//! The engine owns startup sequencing (start watchers, wait for every
//! cache to sync, then run) and shutdown (stop signal fans out to each
//! task, the queue drains, the worker exits after the current item).

pub mod engine;
pub mod event;
pub mod normalize;
pub mod stats;

pub use engine::{Engine, EngineConfig, EngineError, EngineHandle, PassCallback};
pub use event::{Event, EventKind, ResourceClass};
pub use stats::{EngineStats, StatsSnapshot};
