//! Configuration for early-exit routing.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::confidence::{ConfidenceMeasure, ThresholdSchedule};
use crate::error::{Error, Result};

/// Exit routing configuration.
///
/// Two measure families exist. The exit family (`exit_conf_*`) decides when a
/// token leaves the layer stack; the shallow-to-deep family routes between a
/// shallow and a deep path. When both are set the exit family is used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitConfig {
    /// Measure key for the exit family, e.g. `"softmax"`.
    pub exit_conf_type: Option<String>,
    /// Base exit threshold.
    pub exit_conf_threshold: Option<f32>,
    /// Decay temperature. Enables the position-decayed threshold when set.
    pub exit_position_temp: Option<f32>,
    /// Answer length the decay is normalised by. Required with `exit_position_temp`.
    pub max_answer_length: Option<usize>,
    /// Measure key for the shallow-to-deep family.
    pub shallow2deep_conf_type: Option<String>,
    /// Shallow-to-deep threshold.
    pub shallow2deep_conf_threshold: Option<f32>,
}

impl ExitConfig {
    /// Exit family config with a fixed threshold.
    pub fn exit(measure: &str, threshold: f32) -> Self {
        Self {
            exit_conf_type: Some(measure.to_string()),
            exit_conf_threshold: Some(threshold),
            ..Self::default()
        }
    }

    /// Shallow-to-deep family config.
    pub fn shallow_to_deep(measure: &str, threshold: f32) -> Self {
        Self {
            shallow2deep_conf_type: Some(measure.to_string()),
            shallow2deep_conf_threshold: Some(threshold),
            ..Self::default()
        }
    }

    /// Enables the position-decayed exit threshold.
    pub fn with_position_decay(mut self, temperature: f32, max_answer_length: usize) -> Self {
        self.exit_position_temp = Some(temperature);
        self.max_answer_length = Some(max_answer_length);
        self
    }

    /// Parse a config from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        self.measure()?;
        self.threshold_schedule()?;
        Ok(())
    }

    /// The measure of the active family.
    pub fn measure(&self) -> Result<ConfidenceMeasure> {
        self.active_key()?.parse()
    }

    /// Threshold schedule of the active family.
    pub fn threshold_schedule(&self) -> Result<ThresholdSchedule> {
        if self.exit_conf_type.is_some() {
            let base = self.exit_conf_threshold.ok_or_else(|| {
                Error::Config("exit_conf_type is set without exit_conf_threshold".to_string())
            })?;
            let Some(temperature) = self.exit_position_temp else {
                return Ok(ThresholdSchedule::Fixed(base));
            };
            let max_answer_length = match self.max_answer_length {
                Some(length) if length > 0 => length,
                _ => {
                    return Err(Error::Config(
                        "exit_position_temp needs a max_answer_length > 0".to_string(),
                    ))
                }
            };
            return Ok(ThresholdSchedule::PositionDecay { base, temperature, max_answer_length });
        }
        if self.shallow2deep_conf_type.is_some() {
            let threshold = self.shallow2deep_conf_threshold.ok_or_else(|| {
                Error::Config(
                    "shallow2deep_conf_type is set without shallow2deep_conf_threshold".to_string(),
                )
            })?;
            return Ok(ThresholdSchedule::ShallowToDeep(threshold));
        }
        Err(no_family())
    }

    /// Threshold handed to the measures themselves. The trend measures
    /// compare against the undecayed exit threshold.
    pub fn measure_threshold(&self) -> Result<f32> {
        self.exit_conf_threshold
            .or(self.shallow2deep_conf_threshold)
            .ok_or_else(no_family)
    }

    fn active_key(&self) -> Result<&str> {
        self.exit_conf_type
            .as_deref()
            .or(self.shallow2deep_conf_type.as_deref())
            .ok_or_else(no_family)
    }
}

fn no_family() -> Error {
    Error::Config("one of exit_conf_type or shallow2deep_conf_type must be set".to_string())
}
