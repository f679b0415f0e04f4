//! Processing presets and their per-backend parameter tables.
//!
//! A preset name is validated once at submission. Translation into engine
//! arguments goes through the explicit tables below; a preset missing from a
//! backend's table resolves to that backend's default parameters.

use serde::{Deserialize, Serialize};

/// Named processing profile.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    #[strum(to_string = "upscale_2x")]
    #[serde(rename = "upscale_2x")]
    Upscale2x,
    #[strum(to_string = "upscale_4x")]
    #[serde(rename = "upscale_4x")]
    Upscale4x,
    Enhance,
    Denoise,
    Sharpen,
    Compress,
    Fast,
    Normal,
    Hq,
    Default,
}

impl Preset {
    /// Whether the preset asks for enhancement or upscaling, which the selector
    /// prefers to send to a quality-oriented engine.
    pub fn is_enhancement(self) -> bool {
        matches!(self, Self::Upscale2x | Self::Upscale4x | Self::Enhance)
    }
}

/// FFmpeg output arguments, inserted between the input and the output path.
const FFMPEG_TABLE: &[(Preset, &[&str])] = &[
    (
        Preset::Upscale2x,
        &["-vf", "scale=iw*2:ih*2:flags=lanczos", "-c:v", "libx264", "-crf", "18"],
    ),
    (
        Preset::Upscale4x,
        &["-vf", "scale=iw*4:ih*4:flags=lanczos", "-c:v", "libx264", "-crf", "18"],
    ),
    (
        Preset::Denoise,
        &["-vf", "hqdn3d=4:3:6:4.5", "-c:v", "libx264", "-crf", "18"],
    ),
    (
        Preset::Sharpen,
        &["-vf", "unsharp=5:5:1.0:5:5:0.0", "-c:v", "libx264", "-crf", "18"],
    ),
    (
        Preset::Compress,
        &["-c:v", "libx264", "-crf", "23", "-preset", "medium"],
    ),
];

const FFMPEG_DEFAULT: &[&str] = &["-c:v", "libx264", "-crf", "18", "-preset", "medium"];

/// HandBrake `--preset` names.
const HANDBRAKE_TABLE: &[(Preset, &str)] = &[
    (Preset::Fast, "Fast 1080p30"),
    (Preset::Hq, "HQ 1080p30 Surround"),
    (Preset::Compress, "Very Fast 1080p30"),
];

const HANDBRAKE_DEFAULT: &str = "Fast 1080p30";

/// Topaz Video AI `--preset` names.
const TOPAZ_TABLE: &[(Preset, &str)] = &[
    (Preset::Upscale2x, "upscale-2x"),
    (Preset::Upscale4x, "upscale-4x"),
    (Preset::Enhance, "enhance"),
    (Preset::Denoise, "denoise"),
];

const TOPAZ_DEFAULT: &str = "enhance";

fn lookup<T: Copy>(table: &[(Preset, T)], preset: Preset, default: T) -> T {
    table
        .iter()
        .find(|(p, _)| *p == preset)
        .map_or(default, |(_, value)| *value)
}

/// FFmpeg output arguments for a preset.
pub fn ffmpeg_params(preset: Preset) -> Vec<String> {
    lookup(FFMPEG_TABLE, preset, FFMPEG_DEFAULT)
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// HandBrake preset name for a preset.
pub fn handbrake_preset(preset: Preset) -> &'static str {
    lookup(HANDBRAKE_TABLE, preset, HANDBRAKE_DEFAULT)
}

/// Topaz preset name for a preset.
pub fn topaz_preset(preset: Preset) -> &'static str {
    lookup(TOPAZ_TABLE, preset, TOPAZ_DEFAULT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_preset_parse_is_case_insensitive() {
        assert_eq!(Preset::from_str("upscale_4x").unwrap(), Preset::Upscale4x);
        assert_eq!(Preset::from_str("UPSCALE_2X").unwrap(), Preset::Upscale2x);
        assert_eq!(Preset::from_str("Hq").unwrap(), Preset::Hq);
        assert!(Preset::from_str("upscale_8x").is_err());
    }

    #[test]
    fn test_preset_display_round_trips() {
        for preset in Preset::iter() {
            assert_eq!(Preset::from_str(&preset.to_string()).unwrap(), preset);
        }
    }

    #[test]
    fn test_enhancement_presets() {
        assert!(Preset::Upscale2x.is_enhancement());
        assert!(Preset::Enhance.is_enhancement());
        assert!(!Preset::Compress.is_enhancement());
        assert!(!Preset::Fast.is_enhancement());
    }

    #[test]
    fn test_ffmpeg_table_hit() {
        let params = ffmpeg_params(Preset::Upscale4x);
        assert_eq!(params[1], "scale=iw*4:ih*4:flags=lanczos");
    }

    #[test]
    fn test_unmapped_preset_falls_back_to_default() {
        assert_eq!(ffmpeg_params(Preset::Hq), ffmpeg_params(Preset::Default));
        assert_eq!(handbrake_preset(Preset::Upscale4x), "Fast 1080p30");
        assert_eq!(handbrake_preset(Preset::Normal), handbrake_preset(Preset::Default));
        assert_eq!(topaz_preset(Preset::Compress), "enhance");
    }

    #[test]
    fn test_every_preset_resolves_for_every_table() {
        for preset in Preset::iter() {
            assert!(!ffmpeg_params(preset).is_empty());
            assert!(!handbrake_preset(preset).is_empty());
            assert!(!topaz_preset(preset).is_empty());
        }
    }

    #[test]
    fn test_preset_serde() {
        let json = serde_json::to_string(&Preset::Upscale2x).unwrap();
        assert_eq!(json, "\"upscale_2x\"");
        let parsed: Preset = serde_json::from_str("\"denoise\"").unwrap();
        assert_eq!(parsed, Preset::Denoise);
    }
}
