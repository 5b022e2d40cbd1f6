//! Batch bookkeeping and the per-batch result stream.
//!
//! Every item of a batch shares one [`Batch`]. Each item settles exactly
//! once, either after running or after being drained, by publishing its
//! failure (if any) and decrementing `remaining`. Whoever moves `remaining`
//! from one to zero closes the batch's [`ResultStream`].

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Instant;

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use super::cancellation::Cancellation;
use super::error::{PoolError, PoolResult};
use crate::executor::BoxAction;

/// Shared state of one `execute` call.
pub(crate) struct Batch {
    id: u64,
    /// Items not yet settled.
    remaining: AtomicUsize,
    /// Sized to the batch so workers never wait on it.
    failures: mpsc::Sender<PoolError>,
    /// Cancelled once, by the item that settles last.
    finished: CancellationToken,
    /// Fail-fast trigger, cancelled on the first failure.
    abort: Option<CancellationToken>,
}

impl Batch {
    /// Create the bookkeeping for `size` items along with the caller's stream.
    pub(crate) fn new(
        id: u64,
        size: usize,
        abort: Option<CancellationToken>,
    ) -> (Arc<Self>, ResultStream) {
        let (failures, rx) = mpsc::channel(size + 1);
        let finished = CancellationToken::new();

        let batch = Arc::new(Self {
            id,
            remaining: AtomicUsize::new(size),
            failures,
            finished: finished.clone(),
            abort,
        });

        (batch, ResultStream::new(rx, finished))
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    #[cfg(test)]
    pub(crate) fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Record one item's outcome.
    ///
    /// Returns `true` if this call settled the last item and closed the stream.
    pub(crate) fn settle(&self, outcome: PoolResult<()>) -> bool {
        if let Err(err) = outcome {
            // Published first so the cause precedes the cancellations it
            // triggers.
            self.publish(err);
            if let Some(abort) = &self.abort {
                abort.cancel();
            }
        }

        // The failure above must be visible before the stream can observe
        // the close.
        let prev = self.remaining.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "batch {} settled more items than it holds", self.id);

        if prev == 1 {
            self.finished.cancel();
            tracing::debug!(batch = self.id, "batch finished");
            true
        } else {
            false
        }
    }

    fn publish(&self, err: PoolError) {
        match self.failures.try_send(err) {
            Ok(()) => {}
            // Caller dropped the stream; nobody is listening.
            Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(mpsc::error::TrySendError::Full(err)) => {
                tracing::warn!(batch = self.id, error = %err, "failure sink full, report dropped");
            }
        }
    }
}

/// How a dequeued item ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Succeeded,
    Failed,
    /// Cancelled before a worker got to it; the action never ran.
    Skipped,
}

/// One action of one batch, waiting in the queue.
pub(crate) struct PendingItem {
    action: BoxAction,
    cancel: Cancellation,
    batch: Arc<Batch>,
    queued_at: Instant,
}

impl PendingItem {
    pub(crate) fn new(action: BoxAction, cancel: Cancellation, batch: Arc<Batch>) -> Self {
        Self {
            action,
            cancel,
            batch,
            queued_at: Instant::now(),
        }
    }

    /// Execute the action and settle it.
    ///
    /// An item whose cancellation already fired while it sat in the queue is
    /// settled with that reason without invoking the action. A panic inside
    /// the action is reported as [`PoolError::WorkerPanic`].
    pub(crate) async fn run(self, worker: usize) -> Outcome {
        if let Some(reason) = self.cancel.reason() {
            tracing::trace!(worker, batch = self.batch.id(), reason = %reason, "skipping cancelled action");
            self.batch.settle(Err(reason));
            return Outcome::Skipped;
        }

        let queue_wait = self.queued_at.elapsed();

        let outcome = AssertUnwindSafe(self.action.execute(self.cancel.clone()))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(PoolError::WorkerPanic(panic_message(panic.as_ref()))));

        let failed = outcome.is_err();
        tracing::trace!(
            worker,
            batch = self.batch.id(),
            queue_wait_us = queue_wait.as_micros() as u64,
            failed,
            "action finished"
        );

        self.batch.settle(outcome);
        if failed {
            Outcome::Failed
        } else {
            Outcome::Succeeded
        }
    }

    /// Settle without executing.
    pub(crate) fn drain(self, reason: PoolError) {
        self.batch.settle(Err(reason));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Failures of one batch, in the order they were reported.
///
/// Successful actions produce nothing. The stream ends once every action of
/// the batch has either run or been drained, so reaching the end is the
/// signal that the batch is over.
pub struct ResultStream {
    failures: mpsc::Receiver<PoolError>,
    finished: CancellationToken,
    wait: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
    done: bool,
}

impl ResultStream {
    fn new(failures: mpsc::Receiver<PoolError>, finished: CancellationToken) -> Self {
        Self {
            failures,
            finished,
            wait: None,
            done: false,
        }
    }

    /// A stream that is already over.
    pub fn empty() -> Self {
        let (_tx, rx) = mpsc::channel(1);
        let finished = CancellationToken::new();
        finished.cancel();
        Self::new(rx, finished)
    }

    /// A stream yielding a single [`PoolError::Closed`].
    pub fn closed_pool() -> Self {
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.try_send(PoolError::Closed);
        let finished = CancellationToken::new();
        finished.cancel();
        Self::new(rx, finished)
    }

    /// Whether every action of the batch has settled.
    ///
    /// Failures may still be buffered on the stream.
    pub fn is_finished(&self) -> bool {
        self.finished.is_cancelled()
    }

    /// Next failure, or `None` once the batch is over.
    pub async fn next_failure(&mut self) -> Option<PoolError> {
        futures_util::StreamExt::next(self).await
    }

    /// Drain the stream and return the first failure, if any.
    pub async fn into_result(mut self) -> PoolResult<()> {
        let mut first = None;
        while let Some(err) = self.next_failure().await {
            first.get_or_insert(err);
        }
        first.map_or(Ok(()), Err)
    }
}

impl Stream for ResultStream {
    type Item = PoolError;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match this.failures.poll_recv(cx) {
            Poll::Ready(Some(err)) => return Poll::Ready(Some(err)),
            // Every sender is gone: nothing more can arrive.
            Poll::Ready(None) => {
                this.done = true;
                return Poll::Ready(None);
            }
            Poll::Pending => {}
        }

        if this.wait.is_none() {
            this.wait = Some(Box::pin(this.finished.clone().cancelled_owned()));
        }
        if let Some(wait) = this.wait.as_mut() {
            if wait.as_mut().poll(cx).is_pending() {
                return Poll::Pending;
            }
        }

        // Failures are published before the close, so anything left is
        // already buffered.
        match this.failures.try_recv() {
            Ok(err) => Poll::Ready(Some(err)),
            Err(_) => {
                this.done = true;
                Poll::Ready(None)
            }
        }
    }
}

impl std::fmt::Debug for ResultStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStream")
            .field("finished", &self.is_finished())
            .field("done", &self.done)
            .finish()
    }
}
