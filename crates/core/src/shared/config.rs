use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::constants::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_PERSISTENCE_THRESHOLD, DEFAULT_PERSON_CLASS_ID,
    DEFAULT_PROXIMITY_THRESHOLD,
};
use super::error::CrowdError;

/// Tunable parameters of a crowd-detection session.
///
/// Every field has a default, so a JSON file only needs the keys it wants
/// to override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrowdConfig {
    /// Center-to-center distance in pixels below which two boxes group.
    pub proximity_threshold: f64,
    /// Frames a group key must reappear in before it is reported.
    pub persistence_threshold: u32,
    /// Minimum detector confidence for a person box.
    pub confidence_threshold: f64,
    pub person_class_id: u32,
    /// Grid cell (pixels) for jitter-tolerant group keys. `None` keeps exact keys.
    pub key_quantization: Option<f64>,
    /// Evict group keys unseen for this many frames. `None` never evicts.
    pub max_idle_frames: Option<u64>,
}

impl Default for CrowdConfig {
    fn default() -> Self {
        Self {
            proximity_threshold: DEFAULT_PROXIMITY_THRESHOLD,
            persistence_threshold: DEFAULT_PERSISTENCE_THRESHOLD,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            person_class_id: DEFAULT_PERSON_CLASS_ID,
            key_quantization: None,
            max_idle_frames: None,
        }
    }
}

impl CrowdConfig {
    /// Loads a JSON config file and validates it.
    pub fn from_file(path: &Path) -> Result<Self, CrowdError> {
        let json = fs::read_to_string(path).map_err(|e| CrowdError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: CrowdConfig = serde_json::from_str(&json).map_err(|e| CrowdError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CrowdError> {
        if !self.proximity_threshold.is_finite() || self.proximity_threshold < 0.0 {
            return Err(CrowdError::InvalidConfig(format!(
                "proximity_threshold must be a finite non-negative distance, got {}",
                self.proximity_threshold
            )));
        }
        if self.persistence_threshold == 0 {
            return Err(CrowdError::InvalidConfig(
                "persistence_threshold must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(CrowdError::InvalidConfig(format!(
                "confidence_threshold must be between 0.0 and 1.0, got {}",
                self.confidence_threshold
            )));
        }
        if let Some(cell) = self.key_quantization {
            if !cell.is_finite() || cell <= 0.0 {
                return Err(CrowdError::InvalidConfig(format!(
                    "key_quantization must be a positive cell size, got {cell}"
                )));
            }
        }
        if self.max_idle_frames == Some(0) {
            return Err(CrowdError::InvalidConfig(
                "max_idle_frames must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
