//! Execution adapter: runs one attempt of a job and reports a [`ProcessingOutcome`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::{BackendCatalog, BackendType, Invocation, select_backend};
use crate::pipeline::Job;

/// Error recorded when nothing can process a job.
pub const NO_BACKEND_MESSAGE: &str =
    "No video processing backend available. Install FFmpeg, Topaz Video AI, or HandBrake.";

/// Why an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No backend is usable on this host. Permanent.
    NoBackend,
    /// The engine ran but exited non-zero or timed out.
    Execution,
    /// The engine process could not be started or waited on.
    Spawn,
}

impl FailureKind {
    pub fn is_retryable(self) -> bool {
        !matches!(self, Self::NoBackend)
    }
}

/// Result of one execution attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingOutcome {
    pub success: bool,
    /// Output written, on success.
    pub output_path: Option<String>,
    /// Error detail, on failure.
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
    /// Wall-clock seconds from selection to engine exit.
    pub duration_secs: f64,
    pub backend_used: Option<BackendType>,
}

impl ProcessingOutcome {
    pub fn succeeded(
        backend: BackendType,
        output_path: impl Into<String>,
        duration_secs: f64,
    ) -> Self {
        Self {
            success: true,
            output_path: Some(output_path.into()),
            error: None,
            failure: None,
            duration_secs,
            backend_used: Some(backend),
        }
    }

    pub fn failed(
        kind: FailureKind,
        error: impl Into<String>,
        backend: Option<BackendType>,
        duration_secs: f64,
    ) -> Self {
        Self {
            success: false,
            output_path: None,
            error: Some(error.into()),
            failure: Some(kind),
            duration_secs,
            backend_used: backend,
        }
    }

    pub fn no_backend() -> Self {
        Self::failed(FailureKind::NoBackend, NO_BACKEND_MESSAGE, None, 0.0)
    }
}

/// Runs jobs on the backends of a [`BackendCatalog`].
#[derive(Debug, Clone)]
pub struct JobExecutor {
    catalog: Arc<BackendCatalog>,
    timeout: Duration,
}

impl JobExecutor {
    pub fn new(catalog: Arc<BackendCatalog>, timeout: Duration) -> Self {
        Self { catalog, timeout }
    }

    pub fn catalog(&self) -> &Arc<BackendCatalog> {
        &self.catalog
    }

    /// Backend the job would run on right now.
    pub fn select(&self, job: &Job) -> Option<BackendType> {
        select_backend(job.backend, job.preset, &self.catalog.availability())
    }

    /// Select a backend and run the job on it.
    ///
    /// Every failure, including failing to start the engine, is reported through
    /// the returned outcome.
    pub async fn execute(&self, job: &Job) -> ProcessingOutcome {
        match self.select(job) {
            Some(backend) => self.run(job, backend).await,
            None => {
                error!("Job {}: {}", job.id, NO_BACKEND_MESSAGE);
                ProcessingOutcome::no_backend()
            }
        }
    }

    /// Run the job on a specific backend.
    pub async fn run(&self, job: &Job, backend_type: BackendType) -> ProcessingOutcome {
        let start = Instant::now();

        let Some((backend, program)) = self.catalog.resolve(backend_type) else {
            return ProcessingOutcome::failed(
                FailureKind::NoBackend,
                format!("Backend {} is not available", backend_type),
                Some(backend_type),
                0.0,
            );
        };

        let args = backend.build_args(&Invocation {
            input_file: &job.input_file,
            output_file: &job.output_file,
            preset: job.preset,
        });

        info!(
            job_id = %job.id,
            backend = %backend_type,
            preset = %job.preset,
            "Processing {} -> {}",
            job.input_file,
            job.output_file
        );
        debug!(job_id = %job.id, "Invoking {} {:?}", program.display(), args);

        match backend.invoke(&program, &args, self.timeout).await {
            Ok(output) if output.is_success() => {
                let duration = start.elapsed().as_secs_f64();
                info!(
                    job_id = %job.id,
                    backend = %backend_type,
                    "Processing finished in {:.2}s",
                    duration
                );
                ProcessingOutcome::succeeded(backend_type, job.output_file.clone(), duration)
            }
            Ok(output) => {
                let message = format!(
                    "Processing failed with {}: {}",
                    backend_type,
                    output.failure_summary(&program.display().to_string())
                );
                warn!(job_id = %job.id, "{}", message);
                ProcessingOutcome::failed(
                    FailureKind::Execution,
                    message,
                    Some(backend_type),
                    start.elapsed().as_secs_f64(),
                )
            }
            Err(e) => {
                error!(job_id = %job.id, backend = %backend_type, "Could not run engine: {}", e);
                ProcessingOutcome::failed(
                    FailureKind::Spawn,
                    e.to_string(),
                    Some(backend_type),
                    start.elapsed().as_secs_f64(),
                )
            }
        }
    }
}
