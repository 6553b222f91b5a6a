//! Bounded-concurrency scan pipeline.
//!
//! One blocking producer reads identifiers into a bounded work queue, a fixed
//! pool of worker tasks runs the check function on them, and the results are
//! funnelled into a single output queue that the caller's handler drains.
//!
//! Each worker sends a completion signal when the work queue runs dry. A
//! supervisor task owns the output queue's last sender and drops it only
//! after it has seen every worker's signal, so the consumer observes the
//! output close exactly once and never before the slowest worker is done.

use crate::error::ScanError;
use crate::handler::ResultHandler;
use crate::types::{DomainResult, PoolSize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};

/// Counters describing a finished batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchStats {
    /// Identifiers handed to the workers
    pub submitted: usize,
    /// Empty identifiers dropped by the producer
    pub skipped: usize,
    /// Results handed to the handler
    pub delivered: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct ProducerStats {
    submitted: usize,
    skipped: usize,
}

/// Runs batches of checks on a fixed-size worker pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanPipeline {
    pool_size: PoolSize,
}

impl ScanPipeline {
    /// Create a pipeline with `pool_size` workers.
    pub fn new<P: Into<PoolSize>>(pool_size: P) -> Self {
        Self {
            pool_size: pool_size.into(),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size.get()
    }

    /// Check every identifier and hand each result to `handler`.
    ///
    /// Results arrive in completion order, not input order. Identifiers are
    /// trimmed before use, so empty and whitespace-only identifiers are both
    /// skipped (counted in `BatchStats::skipped`). The first `Err` from
    /// `identifiers` stops the producer; results already in flight are still
    /// delivered, then the error is returned.
    ///
    /// The check function is not time-limited here: a check that never
    /// completes stalls its worker and, eventually, the batch.
    pub async fn run<I, F, Fut, H>(
        &self,
        identifiers: I,
        check: F,
        handler: &mut H,
    ) -> Result<BatchStats, ScanError>
    where
        I: IntoIterator<Item = Result<String, ScanError>>,
        I::IntoIter: Send + 'static,
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DomainResult> + Send + 'static,
        H: ResultHandler + ?Sized,
    {
        let pool_size = self.pool_size.get();
        let start_time = Instant::now();
        tracing::info!(pool_size, "starting batch");

        let (work_tx, work_rx) = mpsc::channel::<String>(pool_size);
        let (results_tx, mut results_rx) = mpsc::channel::<DomainResult>(pool_size);
        let (done_tx, mut done_rx) = mpsc::channel::<()>(pool_size);

        let identifiers = identifiers.into_iter();
        let producer = tokio::task::spawn_blocking(move || produce(identifiers, work_tx));

        let work_rx = Arc::new(Mutex::new(work_rx));
        let check = Arc::new(check);
        for worker_id in 0..pool_size {
            let work_rx = Arc::clone(&work_rx);
            let results_tx = results_tx.clone();
            let done_tx = done_tx.clone();
            let check = Arc::clone(&check);

            tokio::spawn(async move {
                loop {
                    // Hold the lock only while waiting for the next item.
                    let next = work_rx.lock().await.recv().await;
                    let Some(domain) = next else { break };

                    tracing::debug!(worker_id, %domain, "checking");
                    let result = (*check)(domain).await;
                    if results_tx.send(result).await.is_err() {
                        break;
                    }
                }
                drop(results_tx);
                let _ = done_tx.send(()).await;
            });
        }
        drop(done_tx);
        drop(work_rx);

        let supervisor = tokio::spawn(async move {
            let mut finished = 0;
            while finished < pool_size {
                // None: every remaining worker is gone without signalling.
                if done_rx.recv().await.is_none() {
                    break;
                }
                finished += 1;
            }
            drop(results_tx);
            finished
        });

        let mut delivered = 0;
        while let Some(result) = results_rx.recv().await {
            handler.handle_domain(&result);
            delivered += 1;
        }

        let finished = supervisor.await?;
        let produced = producer.await?;
        let elapsed = start_time.elapsed();

        if finished < pool_size {
            tracing::error!(finished, pool_size, "workers exited without finishing");
            return Err(ScanError::internal(format!(
                "{} of {} workers exited abnormally",
                pool_size - finished,
                pool_size
            )));
        }

        let produced = produced.map_err(|e| {
            tracing::error!(delivered, "batch aborted: {}", e);
            e
        })?;

        let stats = BatchStats {
            submitted: produced.submitted,
            skipped: produced.skipped,
            delivered,
            elapsed,
        };
        tracing::info!(
            submitted = stats.submitted,
            skipped = stats.skipped,
            delivered = stats.delivered,
            elapsed_ms = elapsed.as_millis() as u64,
            "batch finished"
        );
        Ok(stats)
    }
}

/// Run `check` over `identifiers` on `pool_size` workers, delivering every
/// result to `handler`. See [`ScanPipeline::run`].
pub async fn run_batch<I, F, Fut, H>(
    identifiers: I,
    check: F,
    handler: &mut H,
    pool_size: PoolSize,
) -> Result<BatchStats, ScanError>
where
    I: IntoIterator<Item = Result<String, ScanError>>,
    I::IntoIter: Send + 'static,
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DomainResult> + Send + 'static,
    H: ResultHandler + ?Sized,
{
    ScanPipeline::new(pool_size)
        .run(identifiers, check, handler)
        .await
}

/// Feed the work queue in source order. Dropping `work_tx` on return is what
/// lets the workers drain and stop, including on a read error.
fn produce<I>(identifiers: I, work_tx: mpsc::Sender<String>) -> Result<ProducerStats, ScanError>
where
    I: Iterator<Item = Result<String, ScanError>>,
{
    let mut stats = ProducerStats::default();
    for item in identifiers {
        let domain = item?;
        let domain = domain.trim();
        if domain.is_empty() {
            stats.skipped += 1;
            continue;
        }
        if work_tx.blocking_send(domain.to_string()).is_err() {
            return Err(ScanError::internal(
                "all workers stopped before the input was exhausted",
            ));
        }
        stats.submitted += 1;
    }
    Ok(stats)
}
