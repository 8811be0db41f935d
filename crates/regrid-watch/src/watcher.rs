//! Cache-backed resource watcher.
//!
//! The watcher consumes a feed of source events (an initial list
//! followed by incremental applies/removes), keeps its [`ResourceCache`]
//! current, and fires update handlers with the previous and new record.
//! The feed producer never blocks; the channel is unbounded and the
//! watcher task is the only writer to the cache.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use regrid_state::{ResourceCache, ResourceKey};

/// Errors surfaced by a watcher.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WatchError {
    /// `start` was called more than once.
    #[error("watcher already started")]
    AlreadyStarted,

    /// The cache did not sync within the allowed time.
    #[error("timed out after {elapsed:?} waiting for cache sync")]
    SyncTimeout { elapsed: Duration },
}

/// Callback invoked on every update notification after the initial list.
///
/// Receives the previously cached record (if any) and the new one. Each
/// invocation must build its own state; handlers run on the watcher task
/// and share nothing with other producers.
pub type UpdateHandler<T> = Arc<dyn Fn(Option<&T>, &T) + Send + Sync>;

/// Raw notification from the watch source.
#[derive(Debug, Clone)]
pub enum SourceEvent<T> {
    /// Initial inventory; completes the sync and replaces the cache.
    Listed(Vec<(ResourceKey, T)>),
    /// A record was created or updated.
    Applied(ResourceKey, T),
    /// A record was deleted.
    Removed(ResourceKey),
}

/// Producer handle for a watcher's feed.
///
/// Cheap to clone; sends never block. Sends after the watcher stopped
/// are dropped silently.
pub struct WatchFeeder<T> {
    tx: mpsc::UnboundedSender<SourceEvent<T>>,
}

impl<T> Clone for WatchFeeder<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> WatchFeeder<T> {
    /// Deliver the initial list, marking the watcher synced.
    pub fn listed(&self, items: Vec<(ResourceKey, T)>) {
        let _ = self.tx.send(SourceEvent::Listed(items));
    }

    /// Deliver a create/update notification.
    pub fn applied(&self, key: ResourceKey, record: T) {
        let _ = self.tx.send(SourceEvent::Applied(key, record));
    }

    /// Deliver a delete notification.
    pub fn removed(&self, key: ResourceKey) {
        let _ = self.tx.send(SourceEvent::Removed(key));
    }
}

/// Watcher over one resource kind.
pub struct CacheWatcher<T> {
    cache: ResourceCache<T>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<SourceEvent<T>>>>,
    handlers: Arc<Mutex<Vec<UpdateHandler<T>>>>,
    synced_tx: Mutex<Option<watch::Sender<bool>>>,
    synced_rx: watch::Receiver<bool>,
    kind: &'static str,
}

impl<T: Clone + Send + Sync + 'static> CacheWatcher<T> {
    /// Create a watcher and the feeder that drives it.
    ///
    /// `kind` labels log lines (e.g. `"nodes"`).
    pub fn new(kind: &'static str) -> (Self, WatchFeeder<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (synced_tx, synced_rx) = watch::channel(false);
        let watcher = Self {
            cache: ResourceCache::new(),
            rx: Mutex::new(Some(rx)),
            handlers: Arc::new(Mutex::new(Vec::new())),
            synced_tx: Mutex::new(Some(synced_tx)),
            synced_rx,
            kind,
        };
        (watcher, WatchFeeder { tx })
    }

    /// Handle to the cached snapshot.
    pub fn cache(&self) -> ResourceCache<T> {
        self.cache.clone()
    }

    /// Snapshot lookup by key.
    pub fn get(&self, key: &ResourceKey) -> Option<T> {
        self.cache.get(key)
    }

    /// Whether the initial list has been applied.
    pub fn has_synced(&self) -> bool {
        *self.synced_rx.borrow()
    }

    /// Watchable sync flag, for status reporting.
    pub fn synced_signal(&self) -> watch::Receiver<bool> {
        self.synced_rx.clone()
    }

    /// Register a callback fired on every post-sync update notification.
    ///
    /// Handlers must be registered before `start`.
    pub fn register_update_handler(&self, handler: UpdateHandler<T>) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    /// Start consuming the feed until the stop signal fires or the feed
    /// closes. Returns the task handle; starting twice is an error.
    pub fn start(&self, stop: watch::Receiver<bool>) -> Result<JoinHandle<()>, WatchError> {
        let rx = self
            .rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(WatchError::AlreadyStarted)?;
        let synced_tx = self
            .synced_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(WatchError::AlreadyStarted)?;

        let cache = self.cache.clone();
        let handlers = Arc::clone(&self.handlers);
        let kind = self.kind;

        Ok(tokio::spawn(async move {
            run_watch_loop(kind, rx, cache, handlers, synced_tx, stop).await;
        }))
    }

    /// Wait until the initial list has been applied.
    ///
    /// A timeout here is fatal to startup; the caller aborts the whole
    /// control loop without entering its running state.
    pub async fn wait_for_sync(&self, timeout: Duration) -> Result<(), WatchError> {
        let mut synced = self.synced_rx.clone();
        let wait = async move {
            while !*synced.borrow_and_update() {
                if synced.changed().await.is_err() {
                    // Watcher gone without syncing; wait out the deadline.
                    std::future::pending::<()>().await;
                }
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| WatchError::SyncTimeout { elapsed: timeout })
    }
}

async fn run_watch_loop<T: Clone>(
    kind: &'static str,
    mut rx: mpsc::UnboundedReceiver<SourceEvent<T>>,
    cache: ResourceCache<T>,
    handlers: Arc<Mutex<Vec<UpdateHandler<T>>>>,
    synced_tx: watch::Sender<bool>,
    mut stop: watch::Receiver<bool>,
) {
    debug!(kind, "watcher starting");

    loop {
        tokio::select! {
            res = stop.changed() => {
                if res.is_err() || *stop.borrow() {
                    debug!(kind, "watcher stopping");
                    break;
                }
            }
            event = rx.recv() => {
                let Some(event) = event else {
                    debug!(kind, "watch feed closed");
                    break;
                };
                match event {
                    SourceEvent::Listed(items) => {
                        let count = items.len();
                        cache.replace_all(items);
                        synced_tx.send_replace(true);
                        debug!(kind, count, "initial list applied");
                    }
                    SourceEvent::Applied(key, record) => {
                        let synced = *synced_tx.borrow();
                        let old = cache.insert(key, record.clone());
                        if synced {
                            let handlers =
                                handlers.lock().unwrap_or_else(PoisonError::into_inner);
                            for handler in handlers.iter() {
                                handler(old.as_ref(), &record);
                            }
                        }
                    }
                    SourceEvent::Removed(key) => {
                        cache.remove(&key);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(name: &str) -> ResourceKey {
        ResourceKey::cluster_scoped(name).unwrap()
    }

    fn stop_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    #[tokio::test]
    async fn initial_list_syncs_without_firing_handlers() {
        let (watcher, feeder) = CacheWatcher::<u32>::new("test");
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        watcher.register_update_handler(Arc::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let (_stop_tx, stop_rx) = stop_channel();
        let handle = watcher.start(stop_rx).unwrap();

        assert!(!watcher.has_synced());
        feeder.listed(vec![(key("a"), 1), (key("b"), 2)]);
        watcher.wait_for_sync(Duration::from_secs(1)).await.unwrap();

        assert!(watcher.has_synced());
        assert_eq!(watcher.cache().len(), 2);
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        drop(feeder);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn update_fires_handler_with_old_and_new() {
        let (watcher, feeder) = CacheWatcher::<u32>::new("test");
        let seen: Arc<Mutex<Vec<(Option<u32>, u32)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        watcher.register_update_handler(Arc::new(move |old: Option<&u32>, new: &u32| {
            sink.lock().unwrap().push((old.copied(), *new));
        }));

        let (_stop_tx, stop_rx) = stop_channel();
        let handle = watcher.start(stop_rx).unwrap();

        feeder.listed(vec![(key("a"), 1)]);
        watcher.wait_for_sync(Duration::from_secs(1)).await.unwrap();

        feeder.applied(key("a"), 2);
        feeder.applied(key("new"), 7);
        drop(feeder);
        handle.await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[(Some(1), 2), (None, 7)]);
        assert_eq!(watcher.get(&key("a")), Some(2));
        assert_eq!(watcher.get(&key("new")), Some(7));
    }

    #[tokio::test]
    async fn removed_updates_cache_silently() {
        let (watcher, feeder) = CacheWatcher::<u32>::new("test");
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        watcher.register_update_handler(Arc::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let (_stop_tx, stop_rx) = stop_channel();
        let handle = watcher.start(stop_rx).unwrap();

        feeder.listed(vec![(key("a"), 1)]);
        feeder.removed(key("a"));
        drop(feeder);
        handle.await.unwrap();

        assert_eq!(watcher.cache().len(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn start_twice_is_an_error() {
        let (watcher, _feeder) = CacheWatcher::<u32>::new("test");
        let (_stop_tx, stop_rx) = stop_channel();
        let handle = watcher.start(stop_rx.clone()).unwrap();

        assert_eq!(watcher.start(stop_rx).err(), Some(WatchError::AlreadyStarted));

        drop(_feeder);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn wait_for_sync_times_out_without_list() {
        let (watcher, _feeder) = CacheWatcher::<u32>::new("test");
        let (_stop_tx, stop_rx) = stop_channel();
        let _handle = watcher.start(stop_rx).unwrap();

        let err = watcher
            .wait_for_sync(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, WatchError::SyncTimeout { .. }));
    }

    #[tokio::test]
    async fn stop_signal_ends_the_task() {
        let (watcher, feeder) = CacheWatcher::<u32>::new("test");
        let (stop_tx, stop_rx) = stop_channel();
        let handle = watcher.start(stop_rx).unwrap();

        feeder.listed(vec![]);
        watcher.wait_for_sync(Duration::from_secs(1)).await.unwrap();

        stop_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
