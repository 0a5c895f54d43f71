use serde::{Deserialize, Serialize};
use std::path::Path;

use super::envelope::EnvelopeSettings;
use super::waveform::Waveform;
use crate::error::ConfigError;

/// Shared engine parameters. Volume changes ramp on the master gain; the
/// waveform only applies to voices created after the change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub waveform: Waveform,
    pub volume: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            waveform: Waveform::Triangle,
            volume: 0.8,
        }
    }
}

/// Everything needed to set up an engine, loadable from JSON.
///
/// ```json
/// { "waveform": "sine", "volume": 0.6, "envelope": { "attack": 0.05 } }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    #[serde(flatten)]
    pub engine: EngineConfig,
    pub envelope: EnvelopeSettings,
}

impl EngineSettings {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let mut settings: EngineSettings = serde_json::from_str(json)?;
        settings.engine.volume = clamp_volume(settings.engine.volume);
        settings.envelope = settings.envelope.sanitized();
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}

pub(crate) fn clamp_volume(volume: f32) -> f32 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let settings = EngineSettings::from_json_str("{}").unwrap();
        assert_eq!(settings, EngineSettings::default());
        assert_eq!(settings.engine.waveform, Waveform::Triangle);
        assert_eq!(settings.engine.volume, 0.8);
    }

    #[test]
    fn partial_settings_merge_with_defaults() {
        let settings = EngineSettings::from_json_str(
            r#"{ "waveform": "square", "volume": 3.0, "envelope": { "release": 1.25 } }"#,
        )
        .unwrap();
        assert_eq!(settings.engine.waveform, Waveform::Square);
        assert_eq!(settings.engine.volume, 1.0);
        assert_eq!(settings.envelope.release, 1.25);
        assert_eq!(settings.envelope.attack, EnvelopeSettings::default().attack);
    }

    #[test]
    fn unknown_waveform_is_rejected() {
        let err = EngineSettings::from_json_str(r#"{ "waveform": "noise" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
