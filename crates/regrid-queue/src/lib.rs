//! regrid-queue — the event work queue.
//!
//! Three layers, composed bottom-up:
//!
//! - [`WorkQueue`]: a deduplicating FIFO. At most one pending instance
//!   of an identical item; items re-added while being processed are
//!   re-delivered exactly once after `done`. `get` blocks the single
//!   consumer; producers never block.
//! - [`RateLimiter`]: per-item exponential backoff combined with a
//!   global token bucket, so one flapping identity cannot monopolize
//!   throughput and a burst of distinct identities is still throttled.
//! - [`RetryQueue`]: the queue the control loop actually holds —
//!   `add_rate_limited`, `forget`, and `num_requeues` on top of the
//!   plain queue surface.

pub mod queue;
pub mod rate_limit;
pub mod retry;

pub use queue::WorkQueue;
pub use rate_limit::{RateLimiter, TokenBucket};
pub use retry::RetryQueue;
