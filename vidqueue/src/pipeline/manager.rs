//! Job Manager: the service object tying the queue, backends and workers together.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::job::{Job, JobStatus};
use super::job_queue::{JobQueue, JobQueueConfig, QueueDepthStatus, SubmitRequest};
use super::storage::JobStorage;
use super::worker_pool::{WorkerPool, WorkerPoolConfig};
use crate::backend::{Availability, BackendCatalog, JobExecutor};
use crate::{Error, Result};

/// Configuration for the Job Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobManagerConfig {
    /// Job queue configuration.
    pub job_queue: JobQueueConfig,
    /// Worker pool configuration. `max_workers` is the size reported while stopped.
    pub worker_pool: WorkerPoolConfig,
    /// Per-attempt engine timeout in seconds.
    pub job_timeout_secs: u64,
}

impl Default for JobManagerConfig {
    fn default() -> Self {
        Self {
            job_queue: JobQueueConfig::default(),
            worker_pool: WorkerPoolConfig::default(),
            job_timeout_secs: 3600,
        }
    }
}

/// Queue statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Workers currently executing a job.
    pub active_workers: usize,
    /// Worker pool size.
    pub max_workers: usize,
    pub queue_depth: usize,
    pub queue_status: QueueDepthStatus,
    /// Backend availability from the startup probe.
    pub backends: Availability,
    /// Number of usable backends.
    pub available_backends: usize,
}

/// The Job Manager.
///
/// Built once at startup and shared by reference; owns the job queue, the
/// backend catalog (through the executor) and, while started, the worker pool.
pub struct JobManager {
    config: JobManagerConfig,
    job_queue: Arc<JobQueue>,
    executor: Arc<JobExecutor>,
    pool: parking_lot::Mutex<Option<Arc<WorkerPool>>>,
}

impl JobManager {
    pub fn new(
        config: JobManagerConfig,
        storage: Arc<dyn JobStorage>,
        catalog: Arc<BackendCatalog>,
    ) -> Self {
        let job_queue = Arc::new(JobQueue::with_config(storage, config.job_queue.clone()));
        let executor = Arc::new(JobExecutor::new(
            catalog,
            Duration::from_secs(config.job_timeout_secs),
        ));
        Self {
            config,
            job_queue,
            executor,
            pool: parking_lot::Mutex::new(None),
        }
    }

    /// Load persisted jobs, resetting interrupted ones to pending.
    pub fn recover_jobs(&self) -> Result<usize> {
        info!("Recovering jobs from storage...");
        let recovered = self.job_queue.recover_jobs()?;
        if recovered > 0 {
            info!("{} pending jobs ready for dispatch", recovered);
        } else {
            debug!("No pending jobs to recover");
        }
        Ok(recovered)
    }

    /// Start `worker_count` workers. Does nothing if already started.
    ///
    /// Fails while a previous pool is still stopping, so two pools never run at once.
    pub fn start(&self, worker_count: usize) -> Result<()> {
        if worker_count == 0 {
            return Err(Error::validation("worker count must be at least 1"));
        }

        let mut pool = self.pool.lock();
        if let Some(existing) = pool.as_ref() {
            if existing.is_running() {
                warn!("Job Manager already started");
                return Ok(());
            }
            return Err(Error::Other(
                "Job Manager is still stopping; wait for stop to finish".to_string(),
            ));
        }

        info!("Starting Job Manager");
        let worker_pool = Arc::new(WorkerPool::with_config(WorkerPoolConfig {
            max_workers: worker_count,
            ..self.config.worker_pool.clone()
        }));
        worker_pool.start(self.job_queue.clone(), self.executor.clone());
        *pool = Some(worker_pool);

        info!("Job Manager started");
        Ok(())
    }

    /// Stop the workers, letting in-flight jobs finish.
    pub async fn stop(&self) {
        let pool = {
            let slot = self.pool.lock();
            match slot.as_ref() {
                Some(pool) if pool.is_running() => {
                    pool.request_stop();
                    pool.clone()
                }
                Some(_) => {
                    debug!("Job Manager already stopping");
                    return;
                }
                None => {
                    debug!("Job Manager not running");
                    return;
                }
            }
        };

        info!("Stopping Job Manager");
        pool.stop().await;
        // The slot stays occupied until every worker has exited.
        *self.pool.lock() = None;
        info!("Job Manager stopped");
    }

    pub fn is_running(&self) -> bool {
        self.pool.lock().as_ref().is_some_and(|pool| pool.is_running())
    }

    /// Validate and enqueue a job. Returns its ID.
    pub fn submit(&self, request: SubmitRequest) -> Result<String> {
        self.job_queue.submit(request)
    }

    /// Cancel a pending job. `false` if it is running or finished.
    pub fn cancel(&self, job_id: &str) -> Result<bool> {
        self.job_queue.cancel(job_id)
    }

    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.job_queue.get(job_id)
    }

    /// Jobs ordered by priority, then submission order.
    pub fn list(&self, status: Option<JobStatus>) -> Vec<Job> {
        self.job_queue.list(status)
    }

    pub fn stats(&self) -> QueueStats {
        let jobs = self.job_queue.stats();
        let (active_workers, max_workers) = match self.pool.lock().as_ref() {
            Some(pool) => (pool.active_count(), pool.max_workers()),
            None => (0, self.config.worker_pool.max_workers),
        };

        QueueStats {
            total: jobs.total,
            pending: jobs.pending,
            running: jobs.running,
            completed: jobs.completed,
            failed: jobs.failed,
            cancelled: jobs.cancelled,
            active_workers,
            max_workers,
            queue_depth: self.job_queue.depth(),
            queue_status: self.job_queue.depth_status(),
            backends: self.executor.catalog().availability(),
            available_backends: self.executor.catalog().available_count(),
        }
    }

    /// Get the current queue depth.
    pub fn queue_depth(&self) -> usize {
        self.job_queue.depth()
    }

    /// Get the queue depth status.
    pub fn queue_status(&self) -> QueueDepthStatus {
        self.job_queue.depth_status()
    }

    pub fn backend_availability(&self) -> Availability {
        self.executor.catalog().availability()
    }
}
