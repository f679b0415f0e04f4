//! Backend catalog: which engines are usable on this host.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing::{debug, info, warn};

use super::{Backend, BackendType, FfmpegBackend, HandbrakeBackend, TopazBackend};

/// Backend name to "usable here".
pub type Availability = BTreeMap<BackendType, bool>;

/// Explicit executable locations, tried before `PATH`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendPaths {
    pub topaz: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
    pub handbrake: Option<PathBuf>,
}

struct CatalogEntry {
    backend: Arc<dyn Backend>,
    program: Option<PathBuf>,
}

/// Registered backends and the result of probing them once at startup.
///
/// Read-only after construction, so it is shared between workers behind an `Arc`
/// without locking.
pub struct BackendCatalog {
    entries: HashMap<BackendType, CatalogEntry>,
}

impl BackendCatalog {
    /// Probe every backend and cache the result.
    ///
    /// A later registration of the same [`BackendType`] replaces an earlier one.
    pub fn probe(backends: Vec<Arc<dyn Backend>>) -> Self {
        let mut entries = HashMap::with_capacity(backends.len());
        for backend in backends {
            let backend_type = backend.backend_type();
            let program = backend.probe();
            match &program {
                Some(path) => debug!("Backend {} found at {}", backend_type, path.display()),
                None => debug!("Backend {} not found", backend_type),
            }
            entries.insert(backend_type, CatalogEntry { backend, program });
        }

        let catalog = Self { entries };
        let available: Vec<String> = catalog
            .available_backends()
            .iter()
            .map(ToString::to_string)
            .collect();
        if available.is_empty() {
            warn!("No video processing backend available; jobs will fail until one is installed");
        } else {
            info!("Available backends: {}", available.join(", "));
        }
        catalog
    }

    /// Probe the built-in Topaz, FFmpeg and HandBrake backends.
    pub fn with_defaults(paths: &BackendPaths) -> Self {
        Self::probe(vec![
            Arc::new(TopazBackend::with_binary_path(paths.topaz.clone())),
            Arc::new(FfmpegBackend::with_binary_path(paths.ffmpeg.clone())),
            Arc::new(HandbrakeBackend::with_binary_path(paths.handbrake.clone())),
        ])
    }

    pub fn is_available(&self, backend_type: BackendType) -> bool {
        self.entries
            .get(&backend_type)
            .is_some_and(|entry| entry.program.is_some())
    }

    /// Availability of every known backend type, registered or not.
    pub fn availability(&self) -> Availability {
        BackendType::iter()
            .map(|t| (t, self.is_available(t)))
            .collect()
    }

    /// Usable backends in fallback order.
    pub fn available_backends(&self) -> Vec<BackendType> {
        BackendType::FALLBACK_ORDER
            .into_iter()
            .filter(|t| self.is_available(*t))
            .collect()
    }

    pub fn available_count(&self) -> usize {
        self.available_backends().len()
    }

    /// Backend implementation and executable for a usable backend.
    pub fn resolve(&self, backend_type: BackendType) -> Option<(Arc<dyn Backend>, PathBuf)> {
        let entry = self.entries.get(&backend_type)?;
        let program = entry.program.clone()?;
        Some((Arc::clone(&entry.backend), program))
    }
}

impl std::fmt::Debug for BackendCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendCatalog")
            .field("availability", &self.availability())
            .finish()
    }
}
