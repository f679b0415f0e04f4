//! Worker pool: a fixed number of loops pulling jobs from the queue.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::job::Job;
use super::job_queue::JobQueue;
use crate::backend::{JobExecutor, ProcessingOutcome};
use crate::{Error, Result};

/// First delay before retrying a result that could not be persisted.
const RECORD_RETRY_INITIAL: Duration = Duration::from_millis(100);
/// Upper bound for the doubling retry delay.
const RECORD_RETRY_MAX: Duration = Duration::from_secs(5);

/// Configuration for a worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Number of concurrent workers.
    pub max_workers: usize,
    /// Poll interval in milliseconds when the queue is empty.
    pub poll_interval_ms: u64,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_workers: 2,
            poll_interval_ms: 500,
        }
    }
}

/// A worker pool for processing jobs.
///
/// Workers never talk to each other; the job queue's lock serializes them.
/// A pool runs once: after [`WorkerPool::stop`] build a new one.
pub struct WorkerPool {
    config: WorkerPoolConfig,
    /// Workers currently executing a job.
    active_workers: Arc<AtomicUsize>,
    cancellation_token: CancellationToken,
    tasks: parking_lot::Mutex<Option<JoinSet<()>>>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::with_config(WorkerPoolConfig::default())
    }

    pub fn with_config(config: WorkerPoolConfig) -> Self {
        Self {
            config,
            active_workers: Arc::new(AtomicUsize::new(0)),
            cancellation_token: CancellationToken::new(),
            tasks: parking_lot::Mutex::new(Some(JoinSet::new())),
        }
    }

    /// Spawn the workers.
    pub fn start(&self, job_queue: Arc<JobQueue>, executor: Arc<JobExecutor>) {
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        info!(
            "Starting worker pool with {} workers",
            self.config.max_workers
        );

        let mut tasks = self.tasks.lock();
        if let Some(ref mut join_set) = *tasks {
            for i in 0..self.config.max_workers {
                let cancellation_token = self.cancellation_token.clone();
                let job_queue = job_queue.clone();
                let executor = executor.clone();
                let active_workers = self.active_workers.clone();
                let notifier = job_queue.notifier();

                join_set.spawn(async move {
                    debug!("Worker {} started", i);

                    loop {
                        if cancellation_token.is_cancelled() {
                            break;
                        }

                        match run_blocking(&job_queue, |queue| queue.dequeue()).await {
                            Ok(Some(job)) => {
                                active_workers.fetch_add(1, Ordering::SeqCst);
                                process_job(i, &job_queue, &executor, job, &cancellation_token)
                                    .await;
                                active_workers.fetch_sub(1, Ordering::SeqCst);
                                continue;
                            }
                            Ok(None) => {}
                            Err(e) => {
                                error!("Error dequeuing job: {}", e);
                            }
                        }

                        // Wait for a job or timeout
                        tokio::select! {
                            _ = cancellation_token.cancelled() => {
                                break;
                            }
                            _ = notifier.notified() => {}
                            _ = tokio::time::sleep(poll_interval) => {}
                        }
                    }

                    debug!("Worker {} shutting down", i);
                });
            }
        }
    }

    /// Signal the workers to exit without waiting for them.
    pub fn request_stop(&self) {
        self.cancellation_token.cancel();
    }

    /// Stop the worker pool.
    ///
    /// Idle workers exit immediately; busy ones finish their current job first.
    pub async fn stop(&self) {
        info!("Stopping worker pool");
        self.request_stop();

        // Take the join set out of the mutex before awaiting
        let join_set = {
            let mut tasks = self.tasks.lock();
            tasks.take()
        };

        if let Some(mut join_set) = join_set {
            while let Some(result) = join_set.join_next().await {
                if let Err(e) = result {
                    error!("Worker task failed: {}", e);
                }
            }
        }

        info!("Worker pool stopped");
    }

    /// Get the number of workers currently executing a job.
    pub fn active_count(&self) -> usize {
        self.active_workers.load(Ordering::SeqCst)
    }

    pub fn max_workers(&self) -> usize {
        self.config.max_workers
    }

    /// Check if the pool is running.
    pub fn is_running(&self) -> bool {
        !self.cancellation_token.is_cancelled()
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a job store call on the blocking pool, since every mutation writes the
/// registry to storage.
async fn run_blocking<T, F>(job_queue: &Arc<JobQueue>, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&JobQueue) -> Result<T> + Send + 'static,
{
    let job_queue = job_queue.clone();
    tokio::task::spawn_blocking(move || op(&job_queue))
        .await
        .map_err(|e| Error::Other(format!("job store task failed: {}", e)))?
}

async fn process_job(
    worker: usize,
    job_queue: &Arc<JobQueue>,
    executor: &JobExecutor,
    job: Job,
    cancellation_token: &CancellationToken,
) {
    debug!(
        "Worker {} processing job {} ({}, attempt {})",
        worker,
        job.id,
        job.priority,
        job.retry_count + 1
    );

    let outcome = executor.execute(&job).await;
    record_outcome(worker, job_queue, &job.id, outcome, cancellation_token).await;
}

/// Persist an attempt's outcome, retrying storage failures with backoff.
///
/// The worker stays busy until the write lands, so the job is never left
/// running without a worker behind it. Once the pool is stopping, one last
/// attempt is made; a job still unrecorded after that stays running on disk and
/// is reset to pending by the next recovery.
async fn record_outcome(
    worker: usize,
    job_queue: &Arc<JobQueue>,
    job_id: &str,
    outcome: ProcessingOutcome,
    cancellation_token: &CancellationToken,
) {
    let mut delay = RECORD_RETRY_INITIAL;
    loop {
        let id = job_id.to_string();
        let attempt = outcome.clone();
        match run_blocking(job_queue, move |queue| queue.finish(&id, &attempt)).await {
            Ok(_) => return,
            Err(Error::Persistence(e)) if !cancellation_token.is_cancelled() => {
                warn!(
                    "Worker {} could not record result of job {}, retrying in {:?}: {}",
                    worker, job_id, delay, e
                );
            }
            Err(e) => {
                error!("Failed to record result of job {}: {}", job_id, e);
                return;
            }
        }

        tokio::select! {
            _ = cancellation_token.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
        delay = (delay * 2).min(RECORD_RETRY_MAX);
    }
}
