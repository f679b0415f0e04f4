//! Backend selection policy.

use super::{Availability, BackendPreference, BackendType, Preset};

fn is_usable(availability: &Availability, backend: BackendType) -> bool {
    availability.get(&backend).copied().unwrap_or(false)
}

/// Pick the backend to run a job on.
///
/// An explicitly requested backend wins when it is usable. Otherwise (or for
/// `auto`) enhancement presets go to a quality-oriented backend when one is
/// usable, and everything else takes the first usable backend in
/// [`BackendType::FALLBACK_ORDER`]. `None` means nothing is usable at all.
pub fn select_backend(
    requested: BackendPreference,
    preset: Preset,
    availability: &Availability,
) -> Option<BackendType> {
    if let BackendPreference::Named(backend) = requested
        && is_usable(availability, backend)
    {
        return Some(backend);
    }

    if preset.is_enhancement()
        && let Some(backend) = BackendType::FALLBACK_ORDER
            .into_iter()
            .find(|b| b.is_quality_oriented() && is_usable(availability, *b))
    {
        return Some(backend);
    }

    BackendType::FALLBACK_ORDER
        .into_iter()
        .find(|b| is_usable(availability, *b))
}
