//! Composite cancellation: the caller's context merged with pool shutdown.

use tokio_util::sync::CancellationToken;

use super::error::PoolError;
use crate::context::Context;

/// Cancellation signal handed to every action of a batch.
///
/// Fires as soon as either the caller's [`Context`] is done or the pool
/// starts shutting down. Waiting is a direct `select!` over both sources, so
/// no relay task is spawned per batch.
#[derive(Clone, Debug)]
pub struct Cancellation {
    context: Context,
    shutdown: CancellationToken,
}

impl Cancellation {
    pub(crate) fn new(context: Context, shutdown: CancellationToken) -> Self {
        Self { context, shutdown }
    }

    /// Wait until either source fires.
    pub async fn cancelled(&self) {
        tokio::select! {
            biased;
            _ = self.context.done() => {}
            _ = self.shutdown.cancelled() => {}
        }
    }

    /// Why the signal fired, or `None` while neither source has.
    ///
    /// The caller's context takes precedence when both have fired.
    pub fn reason(&self) -> Option<PoolError> {
        self.context
            .err()
            .or_else(|| self.shutdown.is_cancelled().then_some(PoolError::Closed))
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// The caller's side of the signal.
    pub fn context(&self) -> &Context {
        &self.context
    }
}
