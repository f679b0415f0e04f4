//! FFmpeg backend.

use async_trait::async_trait;
use std::path::PathBuf;

use super::presets::ffmpeg_params;
use super::{Backend, BackendType, Invocation, locate};

const CANDIDATES: &[&str] = &["ffmpeg"];

/// FFmpeg-based processing backend.
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    /// Explicit binary path, tried before searching `PATH`.
    binary_path: Option<PathBuf>,
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary_path(binary_path: Option<PathBuf>) -> Self {
        Self { binary_path }
    }
}

#[async_trait]
impl Backend for FfmpegBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Ffmpeg
    }

    fn probe(&self) -> Option<PathBuf> {
        locate(self.binary_path.as_deref(), CANDIDATES)
    }

    fn build_args(&self, invocation: &Invocation<'_>) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-i".to_string(),
            invocation.input_file.to_string(),
        ];
        args.extend(ffmpeg_params(invocation.preset));
        args.extend(["-y".to_string(), invocation.output_file.to_string()]);
        args
    }
}
