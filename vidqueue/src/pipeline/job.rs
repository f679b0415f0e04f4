//! Job record and its lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::backend::{BackendPreference, Preset};
use crate::{Error, Result};

/// Metadata key: backend that produced the output.
pub const META_BACKEND_USED: &str = "backend_used";
/// Metadata key: wall-clock seconds of the successful run.
pub const META_PROCESSING_TIME: &str = "processing_time_secs";
/// Metadata key: output written by the successful run.
pub const META_OUTPUT_PATH: &str = "output_path";
/// Metadata key: backend used by the last failed attempt.
pub const META_LAST_BACKEND: &str = "last_backend";
/// Metadata key: failure class of the last failed attempt.
pub const META_FAILURE_KIND: &str = "failure_kind";

/// Job status.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Job is waiting to be processed.
    Pending,
    /// Job is currently being processed.
    Running,
    /// Job completed successfully.
    Completed,
    /// Job failed permanently.
    Failed,
    /// Job was cancelled before it started.
    Cancelled,
}

impl JobStatus {
    /// Terminal states are sinks.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn can_transition_to(self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Pending)
                | (Running, Failed)
        )
    }
}

/// Dispatch priority tier.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Numeric rank, 1 (low) to 4 (critical).
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }
}

/// A video processing job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID.
    pub id: String,
    /// Submission sequence number, strictly increasing per store.
    pub sequence: u64,
    pub input_file: String,
    pub output_file: String,
    pub preset: Preset,
    /// Requested backend.
    pub backend: BackendPreference,
    pub priority: Priority,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Number of failed execution attempts.
    pub retry_count: u32,
    /// Error of the last failed attempt.
    pub error_message: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(
        sequence: u64,
        input_file: impl Into<String>,
        output_file: impl Into<String>,
        preset: Preset,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sequence,
            input_file: input_file.into(),
            output_file: output_file.into(),
            preset,
            backend: BackendPreference::Auto,
            priority: Priority::Medium,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            retry_count: 0,
            error_message: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Set the job priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the requested backend.
    pub fn with_backend(mut self, backend: BackendPreference) -> Self {
        self.backend = backend;
        self
    }

    /// Move to `to`, stamping start/completion times.
    pub fn transition(&mut self, to: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(Error::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }

        let now = Utc::now();
        match to {
            JobStatus::Running => {
                self.started_at = Some(now);
                self.completed_at = None;
            }
            JobStatus::Pending => {
                self.started_at = None;
            }
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => {
                self.completed_at = Some(now);
            }
        }
        self.status = to;
        Ok(())
    }

    /// Time between start and completion of the final attempt.
    pub fn processing_duration(&self) -> Option<Duration> {
        let (start, end) = (self.started_at?, self.completed_at?);
        (end - start).to_std().ok()
    }

    /// Time from submission until the current (or final) attempt started.
    pub fn queue_wait(&self) -> Option<Duration> {
        (self.started_at? - self.created_at).to_std().ok()
    }

    pub fn set_metadata(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }
}
