//! Running engine executables.

use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, warn};

use crate::{Error, Result};

/// Number of trailing stderr lines kept for error reporting.
const STDERR_TAIL_LINES: usize = 20;

/// Output from a command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed (signal or timeout).
    pub exit_code: Option<i32>,
    /// Whether the process was killed for exceeding its timeout.
    pub timed_out: bool,
    /// Wall-clock run time in seconds.
    pub duration_secs: f64,
    /// Last lines written to stderr.
    pub stderr_tail: Vec<String>,
}

impl CommandOutput {
    /// A clean exit with code 0.
    pub fn success() -> Self {
        Self::exited(0)
    }

    /// A normal exit with the given code.
    pub fn exited(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// One-line description of a failed run.
    pub fn failure_summary(&self, program: &str) -> String {
        let mut summary = if self.timed_out {
            format!("{} timed out after {:.0}s", program, self.duration_secs)
        } else {
            match self.exit_code {
                Some(code) => format!("{} exited with code {}", program, code),
                None => format!("{} was terminated by a signal", program),
            }
        };
        if let Some(last) = self.stderr_tail.iter().rev().find(|l| !l.trim().is_empty()) {
            summary.push_str(": ");
            summary.push_str(last.trim());
        }
        summary
    }
}

/// Run a program to completion, streaming its output into tracing.
///
/// The child is killed if it outlives `timeout`. Only failing to spawn or wait on
/// the process is an `Err`.
pub async fn run_command(
    program: &Path,
    args: &[String],
    timeout: Duration,
) -> Result<CommandOutput> {
    let start = Instant::now();

    let mut command = process_utils::tokio_command(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Running {} {:?}", program.display(), args);

    let mut child = command
        .spawn()
        .map_err(|e| Error::Spawn(format!("{}: {}", program.display(), e)))?;

    let stdout_handle = child.stdout.take().map(|stdout| {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("stdout: {}", line);
            }
        })
    });

    // Engines print progress to stderr, so only lines mentioning errors go above debug.
    let stderr_handle = child.stderr.take().map(|stderr| {
        tokio::spawn(async move {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.to_lowercase().contains("error") {
                    warn!("stderr: {}", line);
                } else {
                    debug!("stderr: {}", line);
                }
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail
        })
    });

    let waited = tokio::time::timeout(timeout, child.wait()).await;

    let (exit_code, timed_out) = match waited {
        Ok(Ok(status)) => (status.code(), false),
        Ok(Err(e)) => {
            return Err(Error::Spawn(format!(
                "failed to wait for {}: {}",
                program.display(),
                e
            )));
        }
        Err(_) => {
            error!(
                "{} timed out after {}s, killing it",
                program.display(),
                timeout.as_secs()
            );
            if let Err(e) = child.kill().await {
                warn!("Failed to kill {}: {}", program.display(), e);
            }
            (None, true)
        }
    };

    if let Some(handle) = stdout_handle {
        let _ = handle.await;
    }
    let stderr_tail = match stderr_handle {
        Some(handle) => handle.await.map(Vec::from).unwrap_or_default(),
        None => Vec::new(),
    };

    Ok(CommandOutput {
        exit_code,
        timed_out,
        duration_secs: start.elapsed().as_secs_f64(),
        stderr_tail,
    })
}
