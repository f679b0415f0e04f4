//! Logging setup.
//!
//! Console output always; a daily rolling file as well when a log directory is
//! configured. Timestamps use the local timezone.

use chrono::Local;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::{Error, Result};

/// Default log filter directive, used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "vidqueue=info";

/// Prefix of the rolling log files (`vidqueue.log.YYYY-MM-DD`).
pub const LOG_FILE_PREFIX: &str = "vidqueue.log";

/// Custom timer that uses the local timezone via chrono.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be kept alive
/// for the lifetime of the program.
pub fn init_logging(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::config(format!(
                    "failed to create log directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to set global default subscriber: {}", e)))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert!(DEFAULT_LOG_FILTER.contains("vidqueue=info"));
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn test_local_timer_format() {
        let mut buf = String::new();
        LocalTimer.format_time(&mut Writer::new(&mut buf)).unwrap();
        assert!(chrono::DateTime::parse_from_str(&buf, "%Y-%m-%dT%H:%M:%S%.3f%:z").is_ok());
    }

    #[test]
    fn test_init_logging_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");

        // Another test may already own the global subscriber; the directory is
        // created either way.
        match init_logging(Some(&log_dir)) {
            Ok(guard) => assert!(guard.is_some()),
            Err(e) => assert!(matches!(e, Error::Other(_))),
        }
        assert!(log_dir.is_dir());
    }
}
