//! Topaz Video AI backend.

use async_trait::async_trait;
use std::path::PathBuf;

use super::presets::topaz_preset;
use super::{Backend, BackendType, Invocation, locate};

/// Newer installs ship `topaz-cli`, older ones `tvai`.
const CANDIDATES: &[&str] = &["topaz-cli", "tvai"];

/// Topaz Video AI processing backend.
#[derive(Debug, Clone, Default)]
pub struct TopazBackend {
    binary_path: Option<PathBuf>,
}

impl TopazBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary_path(binary_path: Option<PathBuf>) -> Self {
        Self { binary_path }
    }
}

#[async_trait]
impl Backend for TopazBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Topaz
    }

    fn probe(&self) -> Option<PathBuf> {
        locate(self.binary_path.as_deref(), CANDIDATES)
    }

    fn build_args(&self, invocation: &Invocation<'_>) -> Vec<String> {
        vec![
            "--input".to_string(),
            invocation.input_file.to_string(),
            "--output".to_string(),
            invocation.output_file.to_string(),
            "--preset".to_string(),
            topaz_preset(invocation.preset).to_string(),
        ]
    }
}
