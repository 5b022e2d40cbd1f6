use std::time::Duration;

use tokio_stream::StreamExt;
use tracing::{info, warn};

use tokio_workerpool::config::{Config, DemoConfig};
use tokio_workerpool::executor::{action_fn, BoxAction, Cancellation, PoolError, WorkerPool};
use tokio_workerpool::{logging, Context, PKG_VERSION};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;

    logging::init(&config.logging)?;
    info!("Starting tokio_workerpool {}...", PKG_VERSION);
    config.log_summary();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let pool = WorkerPool::from_config(&config.executor);

    let mut ctx = Context::background();
    if let Some(timeout) = config.demo.timeout {
        ctx = ctx.with_timeout(timeout);
    }

    let mut stream = pool.execute(ctx.clone(), demo_actions(&config.demo)).await;

    // Cancel the batch on Ctrl-C, but keep reading until the stream ends so
    // every action is accounted for.
    let mut failures = 0usize;
    let mut interrupted = false;
    loop {
        tokio::select! {
            failure = stream.next() => match failure {
                Some(err) => {
                    failures += 1;
                    println!("action failed: {}", err);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                info!("Interrupted, cancelling batch...");
                interrupted = true;
                ctx.cancel();
            }
        }
    }

    info!(
        failures,
        executed = pool.stats().executed,
        "Batch finished"
    );

    shutdown(&pool, config.executor.shutdown_timeout).await;
    Ok(())
}

fn demo_actions(demo: &DemoConfig) -> Vec<BoxAction> {
    (0..demo.actions)
        .map(|index| {
            let duration = demo.action_duration;
            let fails = demo.fails(index);
            action_fn(move |cancel: Cancellation| async move {
                tokio::select! {
                    _ = cancel.cancelled() => Err(cancel.reason().unwrap_or(PoolError::Closed)),
                    _ = tokio::time::sleep(duration) => {
                        if fails {
                            Err(PoolError::from(format!("action {} failed", index)))
                        } else {
                            Ok(())
                        }
                    }
                }
            })
        })
        .collect()
}

async fn shutdown(pool: &WorkerPool, timeout: Option<Duration>) {
    info!("Shutting down...");

    let result = match timeout {
        Some(timeout) => match tokio::time::timeout(timeout, pool.close()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(?timeout, "Pool did not close in time");
                return;
            }
        },
        None => pool.close().await,
    };

    if let Err(e) = result {
        warn!(error = %e, "Pool close failed");
    }
}
