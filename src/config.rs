use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, Result, VisualizationError};
use crate::temporal::CaptureType;

/// Sizing shared by every waterfall operation of one engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub samples_per_slice: u64,
    pub fft_size: usize,
    /// Minimum wall time between progress lines during bulk conversion.
    pub progress_interval_secs: f64,
    pub power_bounds_margin: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            samples_per_slice: 1024,
            fft_size: 1024,
            progress_interval_secs: 5.0,
            power_bounds_margin: 0.05,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(raw)
            .map_err(|e| VisualizationError::invalid("engine config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.samples_per_slice == 0 {
            return Err(VisualizationError::invalid(
                "samples_per_slice",
                "must be greater than zero",
            ));
        }
        if self.fft_size == 0 {
            return Err(VisualizationError::invalid(
                "fft_size",
                "must be greater than zero",
            ));
        }
        if !(self.progress_interval_secs.is_finite() && self.progress_interval_secs > 0.0) {
            return Err(VisualizationError::invalid(
                "progress_interval_secs",
                format!("must be positive, got {}", self.progress_interval_secs),
            ));
        }
        if !(self.power_bounds_margin.is_finite() && self.power_bounds_margin >= 0.0) {
            return Err(VisualizationError::invalid(
                "power_bounds_margin",
                format!("must be non-negative, got {}", self.power_bounds_margin),
            ));
        }
        Ok(())
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs_f64(self.progress_interval_secs)
    }
}

/// Metadata-index names per capture type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub indices: BTreeMap<CaptureType, String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        let mut indices = BTreeMap::new();
        indices.insert(CaptureType::DigitalRf, "captures-drf".to_owned());
        indices.insert(CaptureType::RadioHound, "captures-rh".to_owned());
        Self { indices }
    }
}

impl IndexConfig {
    pub fn index_for(&self, capture_type: CaptureType) -> Result<&str> {
        self.indices
            .get(&capture_type)
            .map(String::as_str)
            .ok_or_else(|| {
                ConfigurationError::UnsupportedCaptureType(capture_type.to_string()).into()
            })
    }
}
