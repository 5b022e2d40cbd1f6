//! The unit of work run by an executor.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use super::pool::{Cancellation, PoolResult};

/// A single arbitrary task.
///
/// Implementations should make a best effort to return promptly once
/// `cancel` fires. The pool never interrupts a running action; an action
/// that ignores cancellation only delays shutdown.
#[async_trait]
pub trait Action: Send + Sync {
    /// Performs the work. An `Err` is reported on the batch's result stream.
    async fn execute(&self, cancel: Cancellation) -> PoolResult<()>;
}

/// Shared handle to an action, as accepted by the executors.
pub type BoxAction = Arc<dyn Action>;

/// Adapts a closure into an [`Action`].
pub struct ActionFn<F>(F);

impl<F> ActionFn<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> Action for ActionFn<F>
where
    F: Fn(Cancellation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = PoolResult<()>> + Send + 'static,
{
    async fn execute(&self, cancel: Cancellation) -> PoolResult<()> {
        (self.0)(cancel).await
    }
}

/// Wrap a closure as a [`BoxAction`].
///
/// ```rust,ignore
/// let hello = action_fn(|_cancel| async {
///     println!("hello");
///     Ok(())
/// });
/// ```
pub fn action_fn<F, Fut>(f: F) -> BoxAction
where
    F: Fn(Cancellation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = PoolResult<()>> + Send + 'static,
{
    Arc::new(ActionFn::new(f))
}
