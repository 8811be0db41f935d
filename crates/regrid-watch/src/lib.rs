//! regrid-watch — resource watchers and the periodic pass timer.
//!
//! A [`CacheWatcher`] maintains a live cached snapshot of one resource
//! kind and invokes registered callbacks on updates. It is fed through a
//! [`WatchFeeder`] handle by whatever mechanism actually observes the
//! cluster (the report API in the daemon, deterministic sequences in
//! tests). The watcher exposes the contract the control loop consumes:
//! start, has-synced, update-handler registration, and snapshot lookup.
//!
//! [`PassTimer`] fires a callback on a fixed interval when periodic
//! triggering is configured, and is a no-op otherwise.

pub mod timer;
pub mod watcher;

pub use timer::{FireCallback, PassTimer, TimerError};
pub use watcher::{CacheWatcher, SourceEvent, UpdateHandler, WatchError, WatchFeeder};
