//! Durable job queue: the registry of every job plus the dispatch order.
//!
//! All reads and writes go through one lock. A mutation is applied in memory,
//! then the whole registry is written through [`JobStorage`] while the lock is
//! still held; if the write fails the mutation is undone and the error returned.
//! The lock is never held while a backend runs.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use super::dispatch::{DispatchEntry, DispatchQueue};
use super::job::{
    Job, JobStatus, META_BACKEND_USED, META_FAILURE_KIND, META_LAST_BACKEND, META_OUTPUT_PATH,
    META_PROCESSING_TIME, Priority,
};
use super::storage::JobStorage;
use crate::backend::{BackendPreference, FailureKind, Preset, ProcessingOutcome};
use crate::{Error, Result};

/// Failed execution attempts allowed before a job is marked failed.
pub const MAX_RETRIES: u32 = 3;

/// Configuration for the job queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobQueueConfig {
    /// Warning threshold for queue depth.
    pub warning_threshold: usize,
    /// Critical threshold for queue depth.
    pub critical_threshold: usize,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            warning_threshold: 100,
            critical_threshold: 500,
        }
    }
}

/// Status of queue depth.
///
/// Purely observational: submissions are accepted at any depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueDepthStatus {
    /// Queue depth is normal.
    Normal,
    /// Queue depth is at warning level.
    Warning,
    /// Queue depth is at critical level.
    Critical,
}

/// A job submission as received from a caller, validated by [`JobQueue::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub input_file: String,
    pub output_file: String,
    pub preset: String,
    pub backend: String,
    pub priority: String,
}

impl SubmitRequest {
    /// Submission with the `default` preset, `auto` backend and `medium` priority.
    pub fn new(input_file: impl Into<String>, output_file: impl Into<String>) -> Self {
        Self {
            input_file: input_file.into(),
            output_file: output_file.into(),
            preset: Preset::Default.to_string(),
            backend: BackendPreference::Auto.to_string(),
            priority: Priority::Medium.to_string(),
        }
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = priority.into();
        self
    }

    fn validate(&self) -> Result<(Preset, BackendPreference, Priority)> {
        if self.input_file.trim().is_empty() {
            return Err(Error::validation("input file must not be empty"));
        }
        if self.output_file.trim().is_empty() {
            return Err(Error::validation("output file must not be empty"));
        }
        let preset = Preset::from_str(&self.preset)
            .map_err(|_| Error::validation(format!("unknown preset '{}'", self.preset)))?;
        let backend = BackendPreference::from_str(&self.backend)?;
        let priority = Priority::from_str(&self.priority).map_err(|_| {
            Error::validation(format!(
                "unknown priority '{}' (expected low, medium, high or critical)",
                self.priority
            ))
        })?;
        Ok((preset, backend, priority))
    }
}

/// Job counts by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[derive(Debug)]
struct QueueState {
    jobs: BTreeMap<String, Job>,
    dispatch: DispatchQueue,
    next_sequence: u64,
}

impl Default for QueueState {
    fn default() -> Self {
        Self {
            jobs: BTreeMap::new(),
            dispatch: DispatchQueue::new(),
            next_sequence: 1,
        }
    }
}

/// The job queue.
pub struct JobQueue {
    config: JobQueueConfig,
    storage: Arc<dyn JobStorage>,
    state: Mutex<QueueState>,
    notify: Arc<Notify>,
}

impl JobQueue {
    /// Create an empty queue. Call [`JobQueue::recover_jobs`] to load persisted jobs.
    pub fn new(storage: Arc<dyn JobStorage>) -> Self {
        Self::with_config(storage, JobQueueConfig::default())
    }

    pub fn with_config(storage: Arc<dyn JobStorage>, config: JobQueueConfig) -> Self {
        Self {
            config,
            storage,
            state: Mutex::new(QueueState::default()),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Replace the in-memory registry with the persisted one.
    ///
    /// Jobs left running by a previous process are assumed unfinished and go
    /// back to pending at their original priority and sequence. Returns the
    /// number of pending jobs.
    pub fn recover_jobs(&self) -> Result<usize> {
        let snapshot = self.storage.load()?;

        let mut recovered = QueueState {
            jobs: snapshot.jobs,
            ..Default::default()
        };
        let mut reset = 0;
        for job in recovered.jobs.values_mut() {
            if job.status == JobStatus::Running {
                job.transition(JobStatus::Pending)?;
                reset += 1;
            }
            if job.status == JobStatus::Pending {
                recovered.dispatch.push(DispatchEntry::for_job(job));
            }
        }
        recovered.next_sequence = recovered
            .jobs
            .values()
            .map(|job| job.sequence)
            .max()
            .map_or(1, |max| max + 1);

        if reset > 0 {
            info!("Reset {} interrupted running jobs to pending", reset);
            self.storage.save(&recovered.jobs)?;
        }

        let pending = recovered.dispatch.len();
        info!(
            "Recovered {} jobs ({} pending)",
            recovered.jobs.len(),
            pending
        );
        *self.state.lock() = recovered;

        if pending > 0 {
            self.notify.notify_waiters();
        }
        Ok(pending)
    }

    /// Validate and enqueue a new job. Returns its ID.
    pub fn submit(&self, request: SubmitRequest) -> Result<String> {
        let (preset, backend, priority) = request.validate()?;

        let mut guard = self.state.lock();
        let state = &mut *guard;

        let job = Job::new(
            state.next_sequence,
            request.input_file,
            request.output_file,
            preset,
        )
        .with_backend(backend)
        .with_priority(priority);
        let job_id = job.id.clone();
        let entry = DispatchEntry::for_job(&job);

        state.jobs.insert(job_id.clone(), job);
        if let Err(e) = self.storage.save(&state.jobs) {
            state.jobs.remove(&job_id);
            error!("Failed to persist new job: {}", e);
            return Err(e);
        }
        state.next_sequence += 1;
        state.dispatch.push(entry);
        let depth = state.dispatch.len();
        drop(guard);

        info!(
            "Enqueued job {} ({} priority, preset {}, backend {})",
            job_id, priority, preset, backend
        );
        self.check_depth(depth);
        self.notify.notify_one();

        Ok(job_id)
    }

    /// Cancel a pending job.
    ///
    /// Returns `false` without changing anything if the job is running or
    /// already finished.
    pub fn cancel(&self, job_id: &str) -> Result<bool> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let status = state
            .jobs
            .get(job_id)
            .map(|job| job.status)
            .ok_or_else(|| Error::not_found("Job", job_id))?;
        if status != JobStatus::Pending {
            debug!("Not cancelling job {} in status {}", job_id, status);
            return Ok(false);
        }

        self.persist_change(state, job_id, |job| job.transition(JobStatus::Cancelled))?;
        state.dispatch.remove(job_id);
        drop(guard);

        info!("Cancelled job {}", job_id);
        Ok(true)
    }

    /// Get a job by ID.
    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.state.lock().jobs.get(job_id).cloned()
    }

    /// Jobs ordered by priority (highest first), then submission order.
    pub fn list(&self, status: Option<JobStatus>) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .state
            .lock()
            .jobs
            .values()
            .filter(|job| status.is_none_or(|s| job.status == s))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.sequence.cmp(&b.sequence))
        });
        jobs
    }

    /// Get job statistics.
    pub fn stats(&self) -> JobStats {
        let state = self.state.lock();
        let mut stats = JobStats {
            total: state.jobs.len(),
            ..Default::default()
        };
        for job in state.jobs.values() {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    /// Claim the next pending job, marking it running.
    pub fn dequeue(&self) -> Result<Option<Job>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        while let Some(entry) = state.dispatch.pop() {
            let pending = state
                .jobs
                .get(&entry.job_id)
                .is_some_and(|job| job.status == JobStatus::Pending);
            if !pending {
                continue;
            }

            return match self.persist_change(state, &entry.job_id, |job| {
                job.transition(JobStatus::Running)
            }) {
                Ok(job) => {
                    debug!(
                        "Dequeued job {} (retry {}) after {:.1}s",
                        job.id,
                        job.retry_count,
                        job.queue_wait().unwrap_or_default().as_secs_f64()
                    );
                    Ok(Some(job))
                }
                Err(e) => {
                    state.dispatch.push(entry);
                    Err(e)
                }
            };
        }

        Ok(None)
    }

    /// Record the outcome of a running job's attempt.
    ///
    /// Success completes the job. A missing backend fails it immediately.
    /// Any other failure bumps `retry_count` and requeues the job at its
    /// original priority until [`MAX_RETRIES`] is reached. Returns the new status.
    pub fn finish(&self, job_id: &str, outcome: &ProcessingOutcome) -> Result<JobStatus> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let job = self.persist_change(state, job_id, |job| apply_outcome(job, outcome))?;
        if job.status == JobStatus::Pending {
            state.dispatch.push(DispatchEntry::for_job(&job));
        }
        drop(guard);

        match job.status {
            JobStatus::Completed => info!(
                "Job {} completed with {} in {:.2}s",
                job.id,
                outcome
                    .backend_used
                    .map_or_else(|| "unknown".to_string(), |b| b.to_string()),
                job.processing_duration()
                    .map_or(outcome.duration_secs, |d| d.as_secs_f64())
            ),
            JobStatus::Pending => {
                warn!(
                    "Job {} failed (attempt {}/{}), requeued: {}",
                    job.id,
                    job.retry_count,
                    MAX_RETRIES,
                    job.error_message.as_deref().unwrap_or_default()
                );
                self.notify.notify_one();
            }
            _ => error!(
                "Job {} failed after {} retries: {}",
                job.id,
                job.retry_count,
                job.error_message.as_deref().unwrap_or_default()
            ),
        }

        Ok(job.status)
    }

    /// Number of jobs waiting for dispatch.
    pub fn depth(&self) -> usize {
        self.state.lock().dispatch.len()
    }

    /// Get the queue depth status.
    pub fn depth_status(&self) -> QueueDepthStatus {
        self.status_for_depth(self.depth())
    }

    /// Get a notifier for new jobs.
    pub fn notifier(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    fn status_for_depth(&self, depth: usize) -> QueueDepthStatus {
        if depth >= self.config.critical_threshold {
            QueueDepthStatus::Critical
        } else if depth >= self.config.warning_threshold {
            QueueDepthStatus::Warning
        } else {
            QueueDepthStatus::Normal
        }
    }

    fn check_depth(&self, depth: usize) {
        let status = self.status_for_depth(depth);
        if status > self.status_for_depth(depth.saturating_sub(1)) {
            warn!(
                "Queue depth {} reached {:?} threshold; submissions are still accepted",
                depth, status
            );
        }
    }

    /// Apply `mutate` to a job and persist the registry, restoring the previous
    /// record if either step fails. Returns the updated job.
    fn persist_change(
        &self,
        state: &mut QueueState,
        job_id: &str,
        mutate: impl FnOnce(&mut Job) -> Result<()>,
    ) -> Result<Job> {
        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| Error::not_found("Job", job_id))?;
        let previous = job.clone();

        let result = mutate(job).and_then(|()| self.storage.save(&state.jobs));
        if let Err(e) = result {
            if matches!(e, Error::Persistence(_)) {
                error!("Failed to persist job {}: {}", job_id, e);
            }
            state.jobs.insert(job_id.to_string(), previous);
            return Err(e);
        }

        state
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| Error::not_found("Job", job_id))
    }
}

fn apply_outcome(job: &mut Job, outcome: &ProcessingOutcome) -> Result<()> {
    if outcome.success {
        if let Some(backend) = outcome.backend_used {
            job.set_metadata(META_BACKEND_USED, backend.to_string());
        }
        job.set_metadata(META_PROCESSING_TIME, outcome.duration_secs);
        if let Some(output) = &outcome.output_path {
            job.set_metadata(META_OUTPUT_PATH, output.clone());
        }
        job.error_message = None;
        return job.transition(JobStatus::Completed);
    }

    let kind = outcome.failure.unwrap_or(FailureKind::Execution);
    job.error_message = Some(
        outcome
            .error
            .clone()
            .unwrap_or_else(|| "processing failed".to_string()),
    );
    job.set_metadata(META_FAILURE_KIND, kind.to_string());
    if let Some(backend) = outcome.backend_used {
        job.set_metadata(META_LAST_BACKEND, backend.to_string());
    }

    if !kind.is_retryable() {
        return job.transition(JobStatus::Failed);
    }

    job.retry_count += 1;
    if job.retry_count < MAX_RETRIES {
        job.transition(JobStatus::Pending)
    } else {
        job.transition(JobStatus::Failed)
    }
}
