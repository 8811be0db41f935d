//! The rebalance engine.
//!
//! Owns the watchers, the retry queue, and the single worker that
//! drains it. `run` drives the whole lifecycle: start watchers, wait
//! for every cache to sync (a timeout aborts startup), start the timer,
//! then loop `get → process → done` until the stop signal drains the
//! queue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, trace, warn};

use regrid_queue::RetryQueue;
use regrid_state::{NodeRecord, NodeRef, ResourceCache, WorkloadSet};
use regrid_trigger::{ReadyNodes, TriggerError, TriggerPolicy};
use regrid_watch::{CacheWatcher, PassTimer, TimerError, WatchError};

use crate::event::{Event, ResourceClass};
use crate::normalize;
use crate::stats::{EngineStats, StatsSnapshot};

/// Default time allowed for each cache to complete its initial list.
const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(30);
/// Default retry budget per event identity.
const DEFAULT_MAX_RETRIES: u32 = 5;

/// Errors that abort the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A watcher could not be started.
    #[error("starting {resource} watcher: {source}")]
    WatchStart {
        resource: &'static str,
        source: WatchError,
    },

    /// A cache missed its sync deadline; the engine never starts running.
    #[error("{resource} cache failed to sync: {source}")]
    SyncFailed {
        resource: &'static str,
        source: WatchError,
    },
}

type BoxFuture = std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;

/// Callback invoked with the ready-node set when a pass is triggered.
///
/// This is the boundary to the eviction/rescheduling stage; the worker
/// awaits it, so at most one pass is ever in flight.
pub type PassCallback = Arc<dyn Fn(Vec<NodeRef>) -> BoxFuture + Send + Sync>;

/// Tunables for the engine lifecycle.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-watcher cache sync deadline.
    pub sync_timeout: Duration,
    /// Rate-limited requeues allowed per event identity before dropping.
    pub max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Read-only view of the engine for status reporting.
#[derive(Clone)]
pub struct EngineHandle {
    nodes: ResourceCache<NodeRecord>,
    workload_sets: ResourceCache<WorkloadSet>,
    queue: Arc<RetryQueue<Event>>,
    stats: Arc<EngineStats>,
    nodes_synced: watch::Receiver<bool>,
    workload_sets_synced: watch::Receiver<bool>,
}

impl EngineHandle {
    pub fn node_cache(&self) -> &ResourceCache<NodeRecord> {
        &self.nodes
    }

    pub fn workload_set_cache(&self) -> &ResourceCache<WorkloadSet> {
        &self.workload_sets
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn nodes_synced(&self) -> bool {
        *self.nodes_synced.borrow()
    }

    pub fn workload_sets_synced(&self) -> bool {
        *self.workload_sets_synced.borrow()
    }
}

/// The control loop: watchers in, one worker out.
pub struct Engine {
    nodes: CacheWatcher<NodeRecord>,
    workload_sets: CacheWatcher<WorkloadSet>,
    queue: Arc<RetryQueue<Event>>,
    trigger: Arc<dyn TriggerPolicy>,
    ready_nodes: Arc<dyn ReadyNodes>,
    timer: PassTimer,
    on_pass: Option<PassCallback>,
    stats: Arc<EngineStats>,
    config: EngineConfig,
    /// Set once when all caches have synced; no other writer.
    started_at: Option<Instant>,
}

impl Engine {
    /// Assemble the engine and wire the normalizer callbacks.
    pub fn new(
        nodes: CacheWatcher<NodeRecord>,
        workload_sets: CacheWatcher<WorkloadSet>,
        trigger: Arc<dyn TriggerPolicy>,
        ready_nodes: Arc<dyn ReadyNodes>,
    ) -> Self {
        let queue = RetryQueue::new();

        nodes.register_update_handler(normalize::node_update_handler(Arc::clone(&queue)));
        workload_sets
            .register_update_handler(normalize::workload_set_update_handler(Arc::clone(&queue)));

        Self {
            nodes,
            workload_sets,
            queue,
            trigger,
            ready_nodes,
            timer: PassTimer::disabled(),
            on_pass: None,
            stats: Arc::new(EngineStats::default()),
            config: EngineConfig::default(),
            started_at: None,
        }
    }

    /// Attach a periodic timer; the engine registers its enqueue
    /// callback, so the timer must not have been initialized yet.
    pub fn with_timer(mut self, timer: PassTimer) -> Result<Self, TimerError> {
        timer.init(normalize::timer_callback(Arc::clone(&self.queue)))?;
        self.timer = timer;
        Ok(self)
    }

    /// Set the pass callback invoked with each triggered ready-node set.
    pub fn with_pass_callback(mut self, on_pass: PassCallback) -> Self {
        self.on_pass = Some(on_pass);
        self
    }

    /// Override the lifecycle tunables.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Read-only view for the status surface.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            nodes: self.nodes.cache(),
            workload_sets: self.workload_sets.cache(),
            queue: Arc::clone(&self.queue),
            stats: Arc::clone(&self.stats),
            nodes_synced: self.nodes.synced_signal(),
            workload_sets_synced: self.workload_sets.synced_signal(),
        }
    }

    /// Instant at which all caches had synced, if reached.
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// Run the engine until the external stop signal.
    ///
    /// Every subsystem gets its own receiver derived from an internal
    /// stop channel, and every exit path (including startup failure)
    /// fires it, so no task outlives this call for long.
    pub async fn run(&mut self, external_stop: watch::Receiver<bool>) -> Result<(), EngineError> {
        info!("rebalance engine starting");

        let (stop_tx, stop_rx) = watch::channel(false);
        let stop_tx = Arc::new(stop_tx);

        // Forward the external signal onto the internal channel.
        let forwarder = {
            let stop_tx = Arc::clone(&stop_tx);
            let mut external = external_stop;
            tokio::spawn(async move {
                loop {
                    if *external.borrow_and_update() {
                        break;
                    }
                    if external.changed().await.is_err() {
                        break;
                    }
                }
                let _ = stop_tx.send(true);
            })
        };

        let result = self.run_sequenced(stop_rx).await;

        let _ = stop_tx.send(true);
        forwarder.abort();

        match &result {
            Ok(()) => info!(
                uptime = ?self.started_at.map(|t| t.elapsed()),
                "rebalance engine stopped"
            ),
            Err(err) => error!(%err, "rebalance engine aborted"),
        }
        result
    }

    async fn run_sequenced(&mut self, stop_rx: watch::Receiver<bool>) -> Result<(), EngineError> {
        let node_task =
            self.nodes
                .start(stop_rx.clone())
                .map_err(|source| EngineError::WatchStart {
                    resource: "nodes",
                    source,
                })?;
        let set_task =
            self.workload_sets
                .start(stop_rx.clone())
                .map_err(|source| EngineError::WatchStart {
                    resource: "workload sets",
                    source,
                })?;

        self.nodes
            .wait_for_sync(self.config.sync_timeout)
            .await
            .map_err(|source| EngineError::SyncFailed {
                resource: "nodes",
                source,
            })?;
        self.workload_sets
            .wait_for_sync(self.config.sync_timeout)
            .await
            .map_err(|source| EngineError::SyncFailed {
                resource: "workload sets",
                source,
            })?;

        self.started_at = Some(Instant::now());
        info!(
            nodes = self.nodes.cache().len(),
            workload_sets = self.workload_sets.cache().len(),
            "caches synced, engine ready"
        );

        // Timer starts only once the caches are trustworthy.
        let timer_task = self.timer.run(stop_rx.clone());

        // Shut the queue down when the stop signal fires; the worker
        // then drains and exits after its current item.
        let queue_stopper = {
            let queue = Arc::clone(&self.queue);
            let mut stop = stop_rx;
            tokio::spawn(async move {
                loop {
                    if *stop.borrow_and_update() {
                        break;
                    }
                    if stop.changed().await.is_err() {
                        break;
                    }
                }
                queue.shut_down();
            })
        };

        self.run_worker().await;

        let _ = queue_stopper.await;
        let _ = timer_task.await;
        let _ = node_task.await;
        let _ = set_task.await;
        Ok(())
    }

    /// The single sequential consumer. Seriality is intentional: at
    /// most one trigger evaluation (and one pass) in flight, ever.
    async fn run_worker(&self) {
        while let Some(event) = self.queue.get().await {
            self.process(&event).await;
            self.queue.done(&event);
        }
    }

    async fn process(&self, event: &Event) {
        self.stats.record_processed();

        match event.class {
            ResourceClass::Node | ResourceClass::Timer => {
                if !self.trigger.should_fire(&self.nodes.cache()) {
                    trace!(%event, "trigger held");
                    self.queue.forget(event);
                    return;
                }
                match self.ready_nodes.list(&self.nodes.cache()) {
                    Ok(ready) => {
                        self.queue.forget(event);
                        self.stats.record_pass();
                        info!(%event, ready = ready.len(), "rebalance pass triggered");
                        if let Some(on_pass) = &self.on_pass {
                            on_pass(ready).await;
                        }
                    }
                    Err(err) => self.retry(event, &err),
                }
            }
            ResourceClass::WorkloadSet => {
                // Workload-set recoveries wake the loop but drive no
                // action yet; this arm is the extension point.
                trace!(%event, "workload set event acknowledged");
                self.queue.forget(event);
            }
        }
    }

    fn retry(&self, event: &Event, err: &TriggerError) {
        let attempts = self.queue.num_requeues(event);
        if attempts < self.config.max_retries {
            warn!(%event, %err, attempts, "pass failed, requeueing");
            self.stats.record_retry();
            self.queue.add_rate_limited(event.clone());
        } else {
            warn!(%event, %err, attempts, "retry budget exhausted, dropping event");
            self.stats.record_drop();
            self.queue.forget(event);
        }
    }
}
