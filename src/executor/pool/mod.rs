//! Bounded worker pool.
//!
//! A fixed number of workers pull [`Action`](crate::executor::Action)s from a
//! shared bounded queue. Callers submit whole batches and get back a
//! [`ResultStream`] of the batch's failures, which ends once every action of
//! the batch has been accounted for.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      WorkerPool                            │
//! ├────────────────────────────────────────────────────────────┤
//! │              ┌───────────────┐                             │
//! │              │ execute_with()│  (one Batch per call)       │
//! │              └───────┬───────┘                             │
//! │                      │ reserve() vs. Cancellation          │
//! │              ┌───────▼───────┐                             │
//! │              │  mpsc channel │  (bounded, capacity = N)    │
//! │              └───────┬───────┘                             │
//! │       ┌──────────────┼──────────────┐                      │
//! │  ┌────▼────┐    ┌────▼────┐    ┌────▼────┐                 │
//! │  │ Worker0 │    │ Worker1 │    │ WorkerN │  ...            │
//! │  └────┬────┘    └────┬────┘    └────┬────┘                 │
//! │       └──────────────┴──────────────┘                      │
//! │                      │ settle(): failure + countdown       │
//! │              ┌───────▼───────┐                             │
//! │              │ ResultStream  │  (closed by last settle)    │
//! │              └───────────────┘                             │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Shutdown
//!
//! [`WorkerPool::close`] fires the shutdown token, joins the workers, waits
//! for in-progress submissions, then drains the queue, reporting each left
//! over item as [`PoolError::Closed`]. Actions are never interrupted; they
//! see their [`Cancellation`] fire and are expected to return promptly.

mod batch;
mod cancellation;
mod error;
mod worker;

pub use batch::ResultStream;
pub use cancellation::Cancellation;
pub use error::{PoolError, PoolResult};
pub use worker::{resolve_parallelism, FailurePolicy, WorkerPool, DEFAULT_POOL_NAME};

/// Lifecycle of a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PoolStatus {
    /// Accepting batches.
    Running = 0,
    /// Shutdown sequence in progress.
    Closing = 1,
    /// Workers stopped and queue drained.
    Closed = 2,
}

impl PoolStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PoolStatus::Running,
            1 => PoolStatus::Closing,
            _ => PoolStatus::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PoolStatus::Running => "running",
            PoolStatus::Closing => "closing",
            PoolStatus::Closed => "closed",
        }
    }
}

/// Statistics about pool activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of workers.
    pub workers: usize,
    /// Items waiting in the queue.
    pub queued: usize,
    /// Batches submitted to a running pool.
    pub batches: u64,
    /// `execute` calls still queueing.
    pub in_flight_submissions: usize,
    /// Actions run by a worker.
    pub executed: u64,
    /// Executed actions that failed.
    pub failed: u64,
    /// Queued actions reported as closed during shutdown.
    pub drained: u64,
    /// Actions settled without running because their batch was cancelled,
    /// either before being queued or while waiting in the queue.
    pub aborted: u64,
}
