//! Processing backends.
//!
//! A backend is an external engine executable (Topaz Video AI, FFmpeg, HandBrake)
//! driven as a black box. Each one implements [`Backend`]: it knows how to find its
//! executable, how to turn a preset into arguments, and how to run itself.
//! The [`BackendCatalog`] probes them once at startup, the selector picks one per job,
//! and the [`JobExecutor`] turns a run into a [`ProcessingOutcome`].

mod catalog;
mod command;
mod executor;
mod ffmpeg;
mod handbrake;
mod presets;
mod selector;
mod topaz;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

pub use catalog::{Availability, BackendCatalog, BackendPaths};
pub use command::{CommandOutput, run_command};
pub use executor::{FailureKind, JobExecutor, ProcessingOutcome};
pub use ffmpeg::FfmpegBackend;
pub use handbrake::HandbrakeBackend;
pub use presets::{Preset, ffmpeg_params, handbrake_preset, topaz_preset};
pub use selector::select_backend;
pub use topaz::TopazBackend;

/// Concrete backend kinds.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Topaz Video AI (quality-oriented upscaling/enhancement).
    Topaz,
    /// FFmpeg.
    Ffmpeg,
    /// HandBrake CLI.
    Handbrake,
}

impl BackendType {
    /// Fallback order, highest quality first.
    pub const FALLBACK_ORDER: [BackendType; 3] = [Self::Topaz, Self::Ffmpeg, Self::Handbrake];

    /// Whether this backend is preferred for enhancement/upscaling presets.
    pub fn is_quality_oriented(self) -> bool {
        matches!(self, Self::Topaz)
    }
}

/// The backend a job asked for: a concrete one, or automatic selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackendPreference {
    #[default]
    Auto,
    Named(BackendType),
}

impl FromStr for BackendPreference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        BackendType::from_str(s).map(Self::Named).map_err(|_| {
            Error::validation(format!(
                "unknown backend '{}' (expected auto, topaz, ffmpeg or handbrake)",
                s
            ))
        })
    }
}

impl TryFrom<String> for BackendPreference {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<BackendPreference> for String {
    fn from(value: BackendPreference) -> Self {
        value.to_string()
    }
}

impl fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Named(backend) => write!(f, "{}", backend),
        }
    }
}

/// What to process, handed to [`Backend::build_args`].
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub input_file: &'a str,
    pub output_file: &'a str,
    pub preset: Preset,
}

/// Resolve an engine executable: the explicit path if it resolves, else the
/// first candidate name found on `PATH`.
fn locate(binary_path: Option<&Path>, candidates: &[&str]) -> Option<PathBuf> {
    process_utils::locate_program(binary_path.map(Path::as_os_str), candidates)
}

/// Trait for processing backends.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Get the backend type.
    fn backend_type(&self) -> BackendType;

    /// Locate the backend's executable. `None` means unusable on this host.
    fn probe(&self) -> Option<PathBuf>;

    /// Translate an invocation into command-line arguments.
    fn build_args(&self, invocation: &Invocation<'_>) -> Vec<String>;

    /// Run the backend.
    ///
    /// Non-zero exits and timeouts come back as `Ok` with the details in
    /// [`CommandOutput`]; `Err` is reserved for failing to run the process at all.
    async fn invoke(
        &self,
        program: &Path,
        args: &[String],
        timeout: Duration,
    ) -> Result<CommandOutput> {
        run_command(program, args, timeout).await
    }
}
