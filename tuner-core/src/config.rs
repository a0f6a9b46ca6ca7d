//! Runtime configuration.
//!
//! Settings can be loaded from a JSON file; every field is optional and falls
//! back to its default. The detection thresholds are fixed constants and are
//! not configurable.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TunerError};
use crate::tuning::{TuningModel, TuningProfile, DEFAULT_CALIBRATION_HZ, STRING_COUNT};

/// Samples per analysis frame (~93 ms at 44.1 kHz).
pub const DEFAULT_FRAME_SIZE: usize = 4096;

/// Smallest accepted frame size.
pub const MIN_FRAME_SIZE: usize = 256;

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Samples per frame; must be a power of two.
    pub frame_size: usize,
    /// Preferred capture rate. The device may pick the closest it supports.
    pub sample_rate: u32,
    /// A4 reference in Hz, clamped into [432, 446].
    pub calibration_hz: f32,
    pub tuning: TuningProfile,
    /// Index of the string to lock feedback to (0 = lowest).
    pub locked_string: Option<usize>,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            sample_rate: DEFAULT_SAMPLE_RATE,
            calibration_hz: DEFAULT_CALIBRATION_HZ,
            tuning: TuningProfile::Standard,
            locked_string: None,
        }
    }
}

impl TunerConfig {
    /// Loads a config from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let config: TunerConfig = serde_json::from_str(&data)?;
        config.validate()?;
        log::info!("[CONFIG] Loaded {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_size < MIN_FRAME_SIZE || !self.frame_size.is_power_of_two() {
            return Err(TunerError::InvalidFrameSize(self.frame_size));
        }
        if self.sample_rate == 0 {
            return Err(TunerError::InvalidSampleRate(self.sample_rate));
        }
        if let Some(index) = self.locked_string {
            if index >= STRING_COUNT {
                return Err(TunerError::InvalidString { index, count: STRING_COUNT });
            }
        }
        Ok(())
    }

    pub fn tuning_model(&self) -> TuningModel {
        TuningModel::new(self.tuning, self.calibration_hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_concert_pitch_standard_tuning() {
        let config = TunerConfig::default();
        assert_eq!(config.frame_size, 4096);
        assert_eq!(config.calibration_hz, 440.0);
        assert_eq!(config.tuning, TuningProfile::Standard);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: TunerConfig =
            serde_json::from_str(r#"{ "tuning": "half-step-down", "calibration_hz": 442 }"#).unwrap();
        assert_eq!(config.tuning, TuningProfile::HalfStepDown);
        assert_eq!(config.calibration_hz, 442.0);
        assert_eq!(config.frame_size, DEFAULT_FRAME_SIZE);
        assert_eq!(config.locked_string, None);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let bad_frame = TunerConfig { frame_size: 3000, ..TunerConfig::default() };
        assert!(matches!(bad_frame.validate(), Err(TunerError::InvalidFrameSize(3000))));

        let bad_lock = TunerConfig { locked_string: Some(9), ..TunerConfig::default() };
        assert!(matches!(bad_lock.validate(), Err(TunerError::InvalidString { index: 9, .. })));
    }

    #[test]
    fn save_and_load_through_a_file() {
        let path = std::env::temp_dir().join(format!("tuner-config-{}.json", std::process::id()));
        let config = TunerConfig {
            tuning: TuningProfile::Dadgad,
            locked_string: Some(2),
            ..TunerConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = TunerConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn model_clamps_configured_calibration() {
        let config = TunerConfig { calibration_hz: 460.0, ..TunerConfig::default() };
        assert_eq!(config.tuning_model().calibration(), 446.0);
    }
}
