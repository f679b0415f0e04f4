//! Durable storage for the job registry.
//!
//! The whole registry is rewritten on every mutation. [`JsonFileStorage`] writes
//! to a sibling temporary file and renames it into place, so a crash mid-write
//! leaves the previous registry intact.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::job::Job;
use crate::{Error, Result};

/// The persisted registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub jobs: BTreeMap<String, Job>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    jobs: &'a BTreeMap<String, Job>,
    last_updated: DateTime<Utc>,
}

fn encode(jobs: &BTreeMap<String, Job>) -> Result<String> {
    Ok(serde_json::to_string_pretty(&SnapshotRef {
        jobs,
        last_updated: Utc::now(),
    })?)
}

/// Storage backend owned by the job queue.
///
/// Called with the queue lock held, so implementations must not call back into it.
/// Saves are synchronous and may block on disk; the worker pool runs its queue
/// calls on tokio's blocking pool.
pub trait JobStorage: Send + Sync {
    /// Load the registry. Nothing stored yet is an empty snapshot.
    fn load(&self) -> Result<JobSnapshot>;

    /// Replace the stored registry.
    fn save(&self, jobs: &BTreeMap<String, Job>) -> Result<()>;
}

/// Registry kept in a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_atomic(&self, contents: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.tmp_path();
        let mut file = File::create(&tmp_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &self.path)
    }
}

impl JobStorage for JsonFileStorage {
    fn load(&self) -> Result<JobSnapshot> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No job registry at {}, starting empty", self.path.display());
                return Ok(JobSnapshot::default());
            }
            Err(e) => {
                return Err(Error::persistence(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        serde_json::from_str(&raw).map_err(|e| {
            Error::persistence(format!(
                "corrupt job registry {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn save(&self, jobs: &BTreeMap<String, Job>) -> Result<()> {
        let contents = encode(jobs)?;
        self.write_atomic(&contents).map_err(|e| {
            Error::persistence(format!("failed to write {}: {}", self.path.display(), e))
        })
    }
}

/// In-process storage. Clones share the same contents, which lets tests
/// simulate a restart by building a second queue over a clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    contents: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoded copy of what was last saved.
    pub fn snapshot(&self) -> Option<JobSnapshot> {
        let contents = self.contents.lock();
        contents
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

impl JobStorage for MemoryStorage {
    fn load(&self) -> Result<JobSnapshot> {
        match self.contents.lock().as_deref() {
            Some(raw) => Ok(serde_json::from_str(raw)?),
            None => Ok(JobSnapshot::default()),
        }
    }

    fn save(&self, jobs: &BTreeMap<String, Job>) -> Result<()> {
        let contents = encode(jobs)?;
        *self.contents.lock() = Some(contents);
        Ok(())
    }
}
