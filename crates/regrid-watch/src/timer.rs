//! Periodic pass timer.
//!
//! When periodic triggering is configured, the timer fires its callback
//! on a fixed interval until the stop signal. Without configuration the
//! timer is disabled and `run` is a no-op.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Errors raised while configuring the timer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    /// The configured interval is zero.
    #[error("periodic interval must be greater than zero")]
    ZeroInterval,

    /// `init` was called more than once.
    #[error("timer callback already registered")]
    AlreadyInitialized,
}

/// Callback fired on every tick.
pub type FireCallback = std::sync::Arc<dyn Fn() + Send + Sync>;

/// Interval timer driving time-based trigger evaluation.
pub struct PassTimer {
    interval: Option<Duration>,
    on_fire: Mutex<Option<FireCallback>>,
}

impl PassTimer {
    /// A timer that never fires (periodic mode not configured).
    pub fn disabled() -> Self {
        Self {
            interval: None,
            on_fire: Mutex::new(None),
        }
    }

    /// A timer firing every `interval`.
    pub fn new(interval: Duration) -> Result<Self, TimerError> {
        if interval.is_zero() {
            return Err(TimerError::ZeroInterval);
        }
        Ok(Self {
            interval: Some(interval),
            on_fire: Mutex::new(None),
        })
    }

    /// Whether periodic mode is configured.
    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    /// Register the fire callback. May be called once.
    pub fn init(&self, on_fire: FireCallback) -> Result<(), TimerError> {
        let mut slot = self.on_fire.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(TimerError::AlreadyInitialized);
        }
        *slot = Some(on_fire);
        Ok(())
    }

    /// Start ticking until the stop signal fires.
    ///
    /// A disabled or uninitialized timer returns an immediately finished
    /// handle.
    pub fn run(&self, mut stop: watch::Receiver<bool>) -> JoinHandle<()> {
        let Some(interval) = self.interval else {
            debug!("periodic mode not configured, timer idle");
            return tokio::spawn(async {});
        };
        let Some(on_fire) = self
            .on_fire
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        else {
            debug!("timer has no callback, staying idle");
            return tokio::spawn(async {});
        };

        info!(interval_secs = interval.as_secs(), "pass timer started");

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        on_fire();
                    }
                    res = stop.changed() => {
                        if res.is_err() || *stop.borrow() {
                            debug!("pass timer stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}
