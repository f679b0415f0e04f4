//! Runtime configuration from environment variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::backend::BackendPaths;
use crate::pipeline::{JobManagerConfig, JobQueueConfig, WorkerPoolConfig};
use crate::{Error, Result};

pub const ENV_STATE_FILE: &str = "VIDQUEUE_STATE_FILE";
pub const ENV_WORKERS: &str = "VIDQUEUE_WORKERS";
pub const ENV_POLL_INTERVAL_MS: &str = "VIDQUEUE_POLL_INTERVAL_MS";
pub const ENV_JOB_TIMEOUT_SECS: &str = "VIDQUEUE_JOB_TIMEOUT_SECS";
pub const ENV_QUEUE_WARNING: &str = "VIDQUEUE_QUEUE_WARNING";
pub const ENV_QUEUE_CRITICAL: &str = "VIDQUEUE_QUEUE_CRITICAL";
pub const ENV_LOG_DIR: &str = "VIDQUEUE_LOG_DIR";
pub const ENV_TOPAZ_PATH: &str = "TOPAZ_PATH";
pub const ENV_FFMPEG_PATH: &str = "FFMPEG_PATH";
pub const ENV_HANDBRAKE_PATH: &str = "HANDBRAKE_PATH";

/// Default location of the persisted job registry.
pub const DEFAULT_STATE_FILE: &str = "data/tmp/video_queue.json";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// JSON file holding the job registry.
    pub state_file: PathBuf,
    /// Number of concurrent workers.
    pub workers: usize,
    /// Idle poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Per-attempt engine timeout in seconds.
    pub job_timeout_secs: u64,
    /// Queue depth that triggers a warning.
    pub queue_warning_threshold: usize,
    /// Queue depth reported as critical.
    pub queue_critical_threshold: usize,
    /// Directory for rolling log files; console only when unset.
    pub log_dir: Option<PathBuf>,
    /// Explicit engine executables.
    #[serde(skip)]
    pub backend_paths: BackendPaths,
}

impl Default for Config {
    fn default() -> Self {
        let manager = JobManagerConfig::default();
        Self {
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            workers: manager.worker_pool.max_workers,
            poll_interval_ms: manager.worker_pool.poll_interval_ms,
            job_timeout_secs: manager.job_timeout_secs,
            queue_warning_threshold: manager.job_queue.warning_threshold,
            queue_critical_threshold: manager.job_queue.critical_threshold,
            log_dir: None,
            backend_paths: BackendPaths::default(),
        }
    }
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; unset or blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let config = Self {
            state_file: get(ENV_STATE_FILE).map_or(defaults.state_file, PathBuf::from),
            workers: parse_or(get(ENV_WORKERS), ENV_WORKERS, defaults.workers)?,
            poll_interval_ms: parse_or(
                get(ENV_POLL_INTERVAL_MS),
                ENV_POLL_INTERVAL_MS,
                defaults.poll_interval_ms,
            )?,
            job_timeout_secs: parse_or(
                get(ENV_JOB_TIMEOUT_SECS),
                ENV_JOB_TIMEOUT_SECS,
                defaults.job_timeout_secs,
            )?,
            queue_warning_threshold: parse_or(
                get(ENV_QUEUE_WARNING),
                ENV_QUEUE_WARNING,
                defaults.queue_warning_threshold,
            )?,
            queue_critical_threshold: parse_or(
                get(ENV_QUEUE_CRITICAL),
                ENV_QUEUE_CRITICAL,
                defaults.queue_critical_threshold,
            )?,
            log_dir: get(ENV_LOG_DIR).map(PathBuf::from),
            backend_paths: BackendPaths {
                topaz: get(ENV_TOPAZ_PATH).map(PathBuf::from),
                ffmpeg: get(ENV_FFMPEG_PATH).map(PathBuf::from),
                handbrake: get(ENV_HANDBRAKE_PATH).map(PathBuf::from),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::config(format!("{} must be at least 1", ENV_WORKERS)));
        }
        if self.job_timeout_secs == 0 {
            return Err(Error::config(format!(
                "{} must be at least 1",
                ENV_JOB_TIMEOUT_SECS
            )));
        }
        if self.queue_warning_threshold > self.queue_critical_threshold {
            return Err(Error::config(format!(
                "{} ({}) must not exceed {} ({})",
                ENV_QUEUE_WARNING,
                self.queue_warning_threshold,
                ENV_QUEUE_CRITICAL,
                self.queue_critical_threshold
            )));
        }
        Ok(())
    }

    pub fn manager_config(&self) -> JobManagerConfig {
        JobManagerConfig {
            job_queue: JobQueueConfig {
                warning_threshold: self.queue_warning_threshold,
                critical_threshold: self.queue_critical_threshold,
            },
            worker_pool: WorkerPoolConfig {
                max_workers: self.workers,
                poll_interval_ms: self.poll_interval_ms,
            },
            job_timeout_secs: self.job_timeout_secs,
        }
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::config(format!("invalid {} '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.state_file, PathBuf::from("data/tmp/video_queue.json"));
        assert_eq!(config.workers, 2);
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.job_timeout_secs, 3600);
        assert_eq!(config.queue_warning_threshold, 100);
        assert_eq!(config.queue_critical_threshold, 500);
        assert!(config.log_dir.is_none());
        assert_eq!(config.backend_paths, BackendPaths::default());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            (ENV_STATE_FILE, "/var/lib/vidqueue/jobs.json"),
            (ENV_WORKERS, " 4 "),
            (ENV_POLL_INTERVAL_MS, "250"),
            (ENV_JOB_TIMEOUT_SECS, "60"),
            (ENV_QUEUE_WARNING, "10"),
            (ENV_QUEUE_CRITICAL, "20"),
            (ENV_LOG_DIR, "logs"),
            (ENV_FFMPEG_PATH, "/opt/ffmpeg/bin/ffmpeg"),
            (ENV_TOPAZ_PATH, ""),
        ])
        .unwrap();

        assert_eq!(config.state_file, PathBuf::from("/var/lib/vidqueue/jobs.json"));
        assert_eq!(config.workers, 4);
        assert_eq!(config.log_dir, Some(PathBuf::from("logs")));
        assert_eq!(
            config.backend_paths.ffmpeg,
            Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg"))
        );
        assert!(config.backend_paths.topaz.is_none());

        let manager = config.manager_config();
        assert_eq!(manager.worker_pool.max_workers, 4);
        assert_eq!(manager.worker_pool.poll_interval_ms, 250);
        assert_eq!(manager.job_timeout_secs, 60);
        assert_eq!(manager.job_queue.warning_threshold, 10);
        assert_eq!(manager.job_queue.critical_threshold, 20);
    }

    #[test]
    fn test_invalid_values() {
        for vars in [
            [(ENV_WORKERS, "many")],
            [(ENV_WORKERS, "0")],
            [(ENV_POLL_INTERVAL_MS, "-5")],
            [(ENV_JOB_TIMEOUT_SECS, "0")],
            [(ENV_QUEUE_WARNING, "1000")],
        ] {
            let err = load(&vars).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "{:?}", vars);
        }
    }
}
