//! Batch executors.
//!
//! An [`Executor`] runs a set of [`Action`]s on behalf of a caller and
//! reports their failures on a [`ResultStream`]. [`WorkerPool`] is the
//! bounded, concurrent implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokio_workerpool::executor::{action_fn, WorkerPool};
//! use tokio_workerpool::Context;
//!
//! let pool = WorkerPool::new(2);
//! let actions = vec![
//!     action_fn(|_| async { println!("hello"); Ok(()) }),
//!     action_fn(|_| async { println!("world"); Ok(()) }),
//! ];
//!
//! let failures = pool.execute(Context::background(), actions).await;
//! assert!(failures.into_result().await.is_ok());
//! pool.close().await?;
//! ```

mod action;
pub mod pool;

use async_trait::async_trait;

pub use action::{action_fn, Action, ActionFn, BoxAction};
pub use pool::{
    Cancellation, FailurePolicy, PoolError, PoolResult, PoolStats, PoolStatus, ResultStream,
    WorkerPool,
};

use crate::context::Context;

/// Something that runs batches of actions.
///
/// Implementations decide concurrency and how they fail once closed.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs all `actions`, making a best effort to cancel outstanding ones
    /// once `ctx` is done. The returned stream ends when the batch is over.
    async fn execute(&self, ctx: Context, actions: Vec<BoxAction>) -> ResultStream;

    /// Releases the executor. Calling it again returns [`PoolError::Closed`].
    async fn close(&self) -> PoolResult<()>;

    /// Returns the name of this executor for logging purposes.
    fn name(&self) -> &str;
}

#[async_trait]
impl Executor for WorkerPool {
    async fn execute(&self, ctx: Context, actions: Vec<BoxAction>) -> ResultStream {
        WorkerPool::execute(self, ctx, actions).await
    }

    async fn close(&self) -> PoolResult<()> {
        WorkerPool::close(self).await
    }

    fn name(&self) -> &str {
        WorkerPool::name(self)
    }
}
