//! tokio_workerpool - Bounded concurrent executor powered by Tokio.
//!
//! A fixed set of workers consumes batches of actions from a shared bounded
//! queue and reports per-action failures back to the submitter on a stream.
//!
//! # Features
//!
//! - **Bounded parallelism**: at most N actions in flight, N queued
//! - **Batch streams**: each `execute` call gets its own failure stream,
//!   closed once every action of the batch has been accounted for
//! - **Cooperative cancellation**: actions observe both the caller's
//!   [`Context`] and the pool's shutdown through one [`Cancellation`](executor::Cancellation)
//! - **Clean shutdown**: `close()` drains queued work instead of dropping it
//! - **Structured logging**: JSON lines via tracing
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_workerpool::executor::{action_fn, WorkerPool};
//! use tokio_workerpool::Context;
//!
//! let pool = WorkerPool::new(4);
//! let stream = pool
//!     .execute(Context::background(), vec![action_fn(|_| async { Ok(()) })])
//!     .await;
//! stream.into_result().await?;
//! pool.close().await?;
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
pub mod context;
pub mod executor;
pub mod logging;

// Re-exports for convenience
pub use config::Config;
pub use context::Context;
pub use executor::{Action, Executor, PoolError, ResultStream, WorkerPool};
