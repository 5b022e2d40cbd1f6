//! Batch execution: results, ordering of completion, parallelism.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_stream::StreamExt;
use tokio_workerpool::executor::{FailurePolicy, PoolError, WorkerPool};
use tokio_workerpool::Context;

use crate::helpers::*;

/// Two workers, four 200ms actions: two rounds, not four.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_all_succeed_in_parallel() {
    let pool = WorkerPool::new(2);
    let actions = (0..4).map(|_| sleep(Duration::from_millis(200))).collect();

    let started = Instant::now();
    let failures: Vec<_> = pool
        .execute(Context::background(), actions)
        .await
        .collect()
        .await;
    let elapsed = started.elapsed();

    assert!(failures.is_empty(), "unexpected failures: {:?}", failures);
    assert!(elapsed >= Duration::from_millis(390), "finished too early: {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(750), "not parallel: {:?}", elapsed);

    // Counters are final once the workers have been joined.
    pool.close().await.unwrap();
    assert_eq!(pool.stats().executed, 4);
}

/// One failure is reported once and does not stop its siblings.
#[tokio::test]
async fn test_failure_does_not_cancel_siblings() {
    let pool = WorkerPool::new(1);
    let actions = vec![
        sleep(Duration::from_millis(200)),
        fail("x"),
        sleep(Duration::from_millis(200)),
    ];

    let started = Instant::now();
    let failures: Vec<_> = pool
        .execute(Context::background(), actions)
        .await
        .collect()
        .await;

    assert_eq!(failures, vec![PoolError::from("x")]);
    // The third action still ran to completion.
    assert!(started.elapsed() >= Duration::from_millis(390));

    let stats = pool.stats();
    assert_eq!(stats.executed, 3);
    assert_eq!(stats.failed, 1);

    pool.close().await.unwrap();
}

/// Without fail-fast, every sibling started by the same gate completes.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fan_out_with_failure() {
    let pool = WorkerPool::new(4);
    let progress = Arc::new(AtomicUsize::new(0));

    let starter = JobSpy::new(&progress);
    let err_job = JobSpy::new(&progress).failing().after(&starter);
    let ok_job = JobSpy::new(&progress)
        .busy(Duration::from_millis(100))
        .after(&starter);
    let end = JobSpy::new(&progress)
        .busy(Duration::from_millis(100))
        .after(&starter);

    let actions = vec![starter.boxed(), err_job.boxed(), ok_job.boxed(), end.boxed()];
    let result = pool
        .execute(Context::background(), actions)
        .await
        .into_result()
        .await;

    assert_eq!(result, Err(PoolError::from(FAILURE)));
    assert_eq!(progress.load(Ordering::SeqCst), 4);

    pool.close().await.unwrap();
}

/// With fail-fast, the first failure cancels the rest of a chained batch.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fail_fast_pipeline() {
    let pool = WorkerPool::new(4);
    let progress = Arc::new(AtomicUsize::new(0));

    let starter = JobSpy::new(&progress);
    let err_job = JobSpy::new(&progress)
        .busy(Duration::from_millis(100))
        .failing()
        .after(&starter);
    let ok_job = JobSpy::new(&progress)
        .busy(Duration::from_secs(60))
        .after(&err_job);
    let end = JobSpy::new(&progress)
        .busy(Duration::from_secs(60))
        .after(&ok_job);

    let actions = vec![starter.boxed(), err_job.boxed(), ok_job.boxed(), end.boxed()];

    let started = Instant::now();
    let failures: Vec<_> = pool
        .execute_with(Context::background(), actions, FailurePolicy::FailFast)
        .await
        .collect()
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(failures.first(), Some(&PoolError::from(FAILURE)));
    assert_eq!(count(&failures, &PoolError::Cancelled), 2);
    // Only the starter and the failing job slept their full time.
    assert_eq!(progress.load(Ordering::SeqCst), 2);

    pool.close().await.unwrap();
}

/// Fail-fast with a single worker: queued and unsubmitted siblings are
/// reported as cancelled.
#[tokio::test]
async fn test_fail_fast_drains_siblings() {
    let pool = WorkerPool::new(1);
    let actions = vec![
        fail("x"),
        sleep(Duration::from_secs(10)),
        sleep(Duration::from_secs(10)),
    ];

    let started = Instant::now();
    let failures: Vec<_> = pool
        .execute_with(Context::background(), actions, FailurePolicy::FailFast)
        .await
        .collect()
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(failures.len(), 3);
    assert_eq!(count(&failures, &PoolError::from("x")), 1);
    assert_eq!(count(&failures, &PoolError::Cancelled), 2);

    pool.close().await.unwrap();
}

/// Fail-fast only cancels the batch, never the caller's context.
#[tokio::test]
async fn test_fail_fast_leaves_caller_context_alone() {
    let pool = WorkerPool::new(1);
    let ctx = Context::background();

    let result = pool
        .execute_with(ctx.clone(), vec![fail("x")], FailurePolicy::FailFast)
        .await
        .into_result()
        .await;

    assert_eq!(result, Err(PoolError::from("x")));
    assert!(!ctx.is_done());

    pool.close().await.unwrap();
}

#[tokio::test]
async fn test_empty_batch() {
    let pool = WorkerPool::new(1);

    let mut stream = pool.execute(Context::background(), Vec::new()).await;
    assert_eq!(stream.next().await, None);
    assert_eq!(pool.stats().batches, 0);

    pool.close().await.unwrap();
}

/// A batch larger than the queue still completes: the submitter waits for
/// room instead of failing.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batch_larger_than_queue() {
    let pool = WorkerPool::new(2);
    let progress = Arc::new(AtomicUsize::new(0));
    let actions = (0..50)
        .map(|_| JobSpy::new(&progress).busy(Duration::from_millis(1)).boxed())
        .collect();

    let result = pool
        .execute(Context::background(), actions)
        .await
        .into_result()
        .await;

    assert_eq!(result, Ok(()));
    assert_eq!(progress.load(Ordering::SeqCst), 50);
    assert_eq!(pool.queued(), 0);

    pool.close().await.unwrap();
}

/// Concurrent batches never see each other's failures.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_batches_are_isolated() {
    const MESSAGES: [&str; 8] = ["b0", "b1", "b2", "b3", "b4", "b5", "b6", "b7"];

    let pool = Arc::new(WorkerPool::new(3));

    let batches = MESSAGES.iter().map(|&msg| {
        let pool = Arc::clone(&pool);
        async move {
            let actions = vec![
                noop(),
                sleep(Duration::from_millis(10)),
                fail(msg),
                noop(),
                sleep(Duration::from_millis(5)),
            ];
            let failures: Vec<_> = pool
                .execute(Context::background(), actions)
                .await
                .collect()
                .await;
            (msg, failures)
        }
    });

    for (msg, failures) in futures_util::future::join_all(batches).await {
        assert_eq!(failures, vec![PoolError::from(msg)], "batch {}", msg);
    }

    pool.close().await.unwrap();

    let stats = pool.stats();
    assert_eq!(stats.batches, 8);
    assert_eq!(stats.executed, 40);
    assert_eq!(stats.failed, 8);
}

/// A panicking action is reported and the worker keeps serving.
#[tokio::test]
async fn test_panic_is_contained() {
    let pool = WorkerPool::new(1);

    let panicking = tokio_workerpool::executor::action_fn(|_| async {
        let values: Vec<u32> = Vec::new();
        if values.is_empty() {
            panic!("no values");
        }
        Ok(())
    });

    let failures: Vec<_> = pool
        .execute(Context::background(), vec![panicking, noop()])
        .await
        .collect()
        .await;
    assert_eq!(failures, vec![PoolError::WorkerPanic("no values".into())]);

    // Same single worker still runs new batches.
    let result = pool
        .execute(Context::background(), vec![noop()])
        .await
        .into_result()
        .await;
    assert_eq!(result, Ok(()));

    pool.close().await.unwrap();
}
