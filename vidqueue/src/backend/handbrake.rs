//! HandBrake CLI backend.

use async_trait::async_trait;
use std::path::PathBuf;

use super::presets::handbrake_preset;
use super::{Backend, BackendType, Invocation, locate};

const CANDIDATES: &[&str] = &["HandBrakeCLI", "handbrakecli"];

/// HandBrake CLI processing backend.
#[derive(Debug, Clone, Default)]
pub struct HandbrakeBackend {
    binary_path: Option<PathBuf>,
}

impl HandbrakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary_path(binary_path: Option<PathBuf>) -> Self {
        Self { binary_path }
    }
}

#[async_trait]
impl Backend for HandbrakeBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Handbrake
    }

    fn probe(&self) -> Option<PathBuf> {
        locate(self.binary_path.as_deref(), CANDIDATES)
    }

    fn build_args(&self, invocation: &Invocation<'_>) -> Vec<String> {
        vec![
            "-i".to_string(),
            invocation.input_file.to_string(),
            "-o".to_string(),
            invocation.output_file.to_string(),
            "--preset".to_string(),
            handbrake_preset(invocation.preset).to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Preset;

    #[test]
    fn test_build_args() {
        let args = HandbrakeBackend::new().build_args(&Invocation {
            input_file: "in.mkv",
            output_file: "out.mp4",
            preset: Preset::Hq,
        });
        assert_eq!(
            args,
            ["-i", "in.mkv", "-o", "out.mp4", "--preset", "HQ 1080p30 Surround"]
        );
    }

    #[test]
    fn test_normal_maps_to_default() {
        let args = HandbrakeBackend::new().build_args(&Invocation {
            input_file: "in.mkv",
            output_file: "out.mp4",
            preset: Preset::Normal,
        });
        assert_eq!(args[5], "Fast 1080p30");
    }
}
