//! Shutdown protocol: idempotence, draining and closed-pool behaviour.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_stream::StreamExt;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;
use tokio_workerpool::executor::{Executor, PoolError, PoolStatus, WorkerPool};
use tokio_workerpool::Context;

use crate::helpers::*;

#[tokio::test]
async fn test_close_is_idempotent() {
    let pool = WorkerPool::new(2);

    assert_ok!(pool.close().await);
    assert_eq!(pool.status(), PoolStatus::Closed);

    let started = Instant::now();
    assert_eq!(pool.close().await, Err(PoolError::Closed));
    assert_eq!(pool.close().await, Err(PoolError::Closed));
    assert!(started.elapsed() < Duration::from_millis(100));
}

/// Racing close() calls: exactly one runs the shutdown.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_close() {
    let pool = WorkerPool::new(4);

    let results = futures_util::future::join_all((0..4).map(|_| pool.close())).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results.iter().filter(|r| **r == Err(PoolError::Closed)).count(),
        3
    );
}

#[tokio::test]
async fn test_execute_on_closed_pool() {
    let pool = WorkerPool::new(1);
    pool.close().await.unwrap();

    let failures: Vec<_> = pool
        .execute(Context::background(), vec![noop(), noop(), noop()])
        .await
        .collect()
        .await;

    assert_eq!(failures, vec![PoolError::Closed]);
    assert!(pool.is_closed());
}

/// Closing while a batch is in flight: running, queued and unsubmitted
/// actions are all accounted for as closed.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_during_execute() {
    let pool = Arc::new(WorkerPool::new(1));
    let gate = CancellationToken::new();

    let running = pool.execute(Context::background(), vec![blocker(&gate)]).await;

    let submit = tokio::spawn({
        let pool = Arc::clone(&pool);
        async move {
            pool.execute(Context::background(), vec![noop(), noop(), noop(), noop()])
                .await
        }
    });

    while pool.queued() < pool.queue_capacity() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_ok!(pool.close().await);

    // The blocker saw the shutdown instead of its gate.
    assert_eq!(running.into_result().await, Err(PoolError::Closed));

    let failures: Vec<_> = submit.await.unwrap().collect().await;
    assert_eq!(failures, vec![PoolError::Closed; 4]);

    let stats = pool.stats();
    assert_eq!(stats.drained, 1);
    assert_eq!(stats.aborted, 3);
    assert_eq!(stats.in_flight_submissions, 0);
}

/// close() waits for actions that are slow to honor cancellation.
#[tokio::test]
async fn test_close_waits_for_stubborn_action() {
    let pool = WorkerPool::new(1);
    let stubborn = tokio_workerpool::executor::action_fn(|_| async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(())
    });

    let stream = pool.execute(Context::background(), vec![stubborn]).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = Instant::now();
    assert_ok!(pool.close().await);
    assert!(started.elapsed() >= Duration::from_millis(150));

    assert_eq!(stream.into_result().await, Ok(()));
}

/// Dropping an open pool still closes every outstanding stream.
#[tokio::test]
async fn test_drop_without_close() {
    let pool = WorkerPool::new(1);
    let stream = pool
        .execute(
            Context::background(),
            vec![sleep(Duration::from_secs(30)), sleep(Duration::from_secs(30))],
        )
        .await;

    drop(pool);

    let failures: Vec<_> = tokio::time::timeout(Duration::from_secs(5), stream.collect::<Vec<_>>())
        .await
        .expect("stream should close after drop");
    assert_eq!(failures, vec![PoolError::Closed, PoolError::Closed]);
}

#[tokio::test]
async fn test_close_through_trait_object() {
    let executor: Arc<dyn Executor> = Arc::new(WorkerPool::with_name(2, "trait"));

    assert_eq!(executor.name(), "trait");
    assert_ok!(executor.close().await);
    assert_err!(executor.close().await);
}
