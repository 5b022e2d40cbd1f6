//! Worker pool implementation.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::batch::{Batch, Outcome, PendingItem, ResultStream};
use super::cancellation::Cancellation;
use super::error::{PoolError, PoolResult};
use super::{PoolStats, PoolStatus};
use crate::config::ExecutorConfig;
use crate::context::Context;
use crate::executor::BoxAction;

/// Pool name used when none is given.
pub const DEFAULT_POOL_NAME: &str = "workerpool";

/// Resolve a requested parallelism: non-positive values mean "one worker
/// per CPU".
pub fn resolve_parallelism(requested: i64) -> NonZeroUsize {
    usize::try_from(requested)
        .ok()
        .and_then(NonZeroUsize::new)
        .unwrap_or_else(|| NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN))
}

/// What a batch does when one of its actions fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Siblings keep running; every failure is reported.
    #[default]
    Continue,
    /// The first failure cancels the rest of the batch: running siblings see
    /// their cancellation fire and unsubmitted ones are drained as cancelled.
    FailFast,
}

/// A fixed set of workers pulling actions from a bounded queue.
///
/// The queue holds at most as many items as there are workers, so a caller
/// submitting a large batch waits for workers to make room (or for its
/// cancellation to fire) instead of buffering without bound.
pub struct WorkerPool {
    shared: Arc<Shared>,
}

struct Shared {
    name: String,
    worker_count: usize,
    queue_tx: mpsc::Sender<PendingItem>,
    /// Shared by all workers; also drained by the shutdown sequence.
    queue_rx: AsyncMutex<mpsc::Receiver<PendingItem>>,
    /// Set once when shutdown starts.
    shutdown: CancellationToken,
    /// Decides which `close` call runs the shutdown sequence.
    closed: AtomicBool,
    status: AtomicU8,
    workers: Mutex<Vec<JoinHandle<()>>>,
    submissions: Submissions,
    next_batch: AtomicU64,
    executed: AtomicU64,
    failed: AtomicU64,
    drained: AtomicU64,
    aborted: AtomicU64,
}

impl WorkerPool {
    /// Create a pool with `parallelism` workers (`<= 0` = CPU count).
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(parallelism: i64) -> Self {
        Self::with_name(parallelism, DEFAULT_POOL_NAME)
    }

    /// Create a named pool. The name shows up in logs.
    pub fn with_name(parallelism: i64, name: impl Into<String>) -> Self {
        Self::spawn(resolve_parallelism(parallelism), name.into())
    }

    /// Create a pool from loaded configuration.
    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::spawn(config.parallelism(), config.pool_name.clone())
    }

    fn spawn(workers: NonZeroUsize, name: String) -> Self {
        let worker_count = workers.get();
        let (queue_tx, queue_rx) = mpsc::channel(worker_count);

        let shared = Arc::new(Shared {
            name,
            worker_count,
            queue_tx,
            queue_rx: AsyncMutex::new(queue_rx),
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
            status: AtomicU8::new(PoolStatus::Running as u8),
            workers: Mutex::new(Vec::with_capacity(worker_count)),
            submissions: Submissions::default(),
            next_batch: AtomicU64::new(1),
            executed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            drained: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
        });

        let handles: Vec<_> = (0..worker_count)
            .map(|id| tokio::spawn(worker_loop(Arc::clone(&shared), id)))
            .collect();
        *shared.workers.lock().unwrap_or_else(PoisonError::into_inner) = handles;

        tracing::info!(
            pool = %shared.name,
            workers = worker_count,
            capacity = worker_count,
            "worker pool created"
        );

        Self { shared }
    }

    /// Run `actions` and return a stream of their failures.
    ///
    /// Equivalent to [`execute_with`](Self::execute_with) with
    /// [`FailurePolicy::Continue`].
    pub async fn execute(&self, ctx: Context, actions: Vec<BoxAction>) -> ResultStream {
        self.execute_with(ctx, actions, FailurePolicy::Continue).await
    }

    /// Enqueue `actions` and return a stream of their failures.
    ///
    /// Returns once every action is either queued or drained. If `ctx` is
    /// done or the pool starts shutting down while actions are still being
    /// queued, the remaining ones are reported with that reason instead of
    /// being queued. The stream ends after every action has been accounted
    /// for.
    ///
    /// On a closed pool the stream yields a single [`PoolError::Closed`].
    pub async fn execute_with(
        &self,
        ctx: Context,
        actions: Vec<BoxAction>,
        policy: FailurePolicy,
    ) -> ResultStream {
        let shared = &self.shared;
        // Registered before the closed check so that close() waits for us.
        let _submission = shared.submissions.enter();

        if shared.closed.load(Ordering::SeqCst) {
            tracing::debug!(pool = %shared.name, "execute on closed pool");
            return ResultStream::closed_pool();
        }
        if actions.is_empty() {
            return ResultStream::empty();
        }

        let size = actions.len();
        let id = shared.next_batch.fetch_add(1, Ordering::Relaxed);

        let (context, abort) = match policy {
            FailurePolicy::Continue => (ctx, None),
            FailurePolicy::FailFast => {
                let child = ctx.child();
                let abort = child.token().clone();
                (child, Some(abort))
            }
        };
        let cancel = Cancellation::new(context, shared.shutdown.clone());
        let (batch, stream) = Batch::new(id, size, abort);

        tracing::debug!(pool = %shared.name, batch = id, actions = size, ?policy, "batch submitted");

        let mut actions = actions.into_iter();
        while let Some(action) = actions.next() {
            let item = PendingItem::new(action, cancel.clone(), Arc::clone(&batch));

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = shared.queue_tx.reserve() => permit.ok(),
            };

            match permit {
                Some(permit) => permit.send(item),
                None => {
                    let reason = cancel.reason().unwrap_or(PoolError::Closed);
                    let skipped = 1 + actions.len();

                    item.drain(reason.clone());
                    for _ in actions.by_ref() {
                        batch.settle(Err(reason.clone()));
                    }
                    shared.aborted.fetch_add(skipped as u64, Ordering::Relaxed);

                    tracing::debug!(
                        pool = %shared.name,
                        batch = id,
                        skipped,
                        reason = %reason,
                        "batch submission aborted"
                    );
                    break;
                }
            }
        }

        stream
    }

    /// Shut the pool down.
    ///
    /// Stops the workers, waits for in-progress `execute` calls, then drains
    /// whatever is still queued as [`PoolError::Closed`]. Only the first call
    /// does this; later calls return `Err(PoolError::Closed)` immediately.
    pub async fn close(&self) -> PoolResult<()> {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return Err(PoolError::Closed);
        }
        Arc::clone(&self.shared).shut_down().await;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn worker_count(&self) -> usize {
        self.shared.worker_count
    }

    /// Queue capacity; always equal to the worker count.
    pub fn queue_capacity(&self) -> usize {
        self.shared.queue_tx.max_capacity()
    }

    /// Items currently waiting in the queue.
    pub fn queued(&self) -> usize {
        self.shared.queue_tx.max_capacity() - self.shared.queue_tx.capacity()
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus::from_u8(self.shared.status.load(Ordering::Acquire))
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> PoolStats {
        let shared = &self.shared;
        PoolStats {
            workers: shared.worker_count,
            queued: self.queued(),
            batches: shared.next_batch.load(Ordering::Relaxed) - 1,
            in_flight_submissions: shared.submissions.active(),
            executed: shared.executed.load(Ordering::Relaxed),
            failed: shared.failed.load(Ordering::Relaxed),
            drained: shared.drained.load(Ordering::Relaxed),
            aborted: shared.aborted.load(Ordering::Relaxed),
        }
    }
}

impl Shared {
    async fn next_item(&self) -> Option<PendingItem> {
        self.queue_rx.lock().await.recv().await
    }

    async fn shut_down(self: Arc<Self>) {
        self.status
            .store(PoolStatus::Closing as u8, Ordering::Release);
        tracing::info!(pool = %self.name, "shutting down worker pool");

        self.shutdown.cancel();

        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in workers {
            if let Err(e) = handle.await {
                tracing::warn!(pool = %self.name, error = %e, "worker task ended abnormally");
            }
        }

        self.submissions.wait_idle().await;

        let mut queue = self.queue_rx.lock().await;
        queue.close();
        let mut drained = 0u64;
        while let Ok(item) = queue.try_recv() {
            item.drain(PoolError::Closed);
            drained += 1;
        }
        self.drained.fetch_add(drained, Ordering::Relaxed);

        self.status.store(PoolStatus::Closed as u8, Ordering::Release);
        tracing::info!(pool = %self.name, drained, "worker pool closed");
    }
}

async fn worker_loop(shared: Arc<Shared>, id: usize) {
    tracing::debug!(pool = %shared.name, worker = id, "worker started");

    loop {
        if shared.shutdown.is_cancelled() {
            break;
        }

        let next = tokio::select! {
            biased;
            _ = shared.shutdown.cancelled() => break,
            item = shared.next_item() => item,
        };

        let Some(item) = next else {
            break;
        };

        // Dequeued in the same instant shutdown fired: report, don't run.
        if shared.shutdown.is_cancelled() {
            item.drain(PoolError::Closed);
            shared.drained.fetch_add(1, Ordering::Relaxed);
            break;
        }

        match item.run(id).await {
            Outcome::Succeeded => {
                shared.executed.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Failed => {
                shared.executed.fetch_add(1, Ordering::Relaxed);
                shared.failed.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Skipped => {
                shared.aborted.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    tracing::debug!(pool = %shared.name, worker = id, "worker stopped");
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.shared.shutdown.cancel();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(Arc::clone(&self.shared).shut_down());
            }
            Err(_) => {
                tracing::warn!(
                    pool = %self.shared.name,
                    "worker pool dropped outside a runtime, queued actions not drained"
                );
            }
        }
    }
}

/// Counts `execute` calls that are still queueing.
#[derive(Default)]
struct Submissions {
    active: AtomicUsize,
    idle: Notify,
}

impl Submissions {
    fn enter(&self) -> SubmissionGuard<'_> {
        self.active.fetch_add(1, Ordering::SeqCst);
        SubmissionGuard(self)
    }

    fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }
}

struct SubmissionGuard<'a>(&'a Submissions);

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        if self.0.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}
