use crate::shared::bounding_box::BoundingBox;
use crate::shared::config::CrowdConfig;
use crate::shared::constants::DEFAULT_PROXIMITY_THRESHOLD;
use crate::shared::error::CrowdError;

use super::group::Group;

/// Builds per-frame proximity groups from person boxes.
///
/// Each input box seeds exactly one group holding itself plus every other
/// box whose center lies strictly closer than `threshold`. This is not a
/// partition: a box near two others shows up in several groups, and the
/// output always has one group per input box.
#[derive(Clone, Debug)]
pub struct GroupBuilder {
    threshold: f64,
}

impl GroupBuilder {
    pub fn new(threshold: f64) -> Result<Self, CrowdError> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(CrowdError::InvalidInput(format!(
                "proximity threshold must be finite and non-negative, got {threshold}"
            )));
        }
        Ok(Self { threshold })
    }

    pub fn from_config(config: &CrowdConfig) -> Result<Self, CrowdError> {
        Self::new(config.proximity_threshold)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// O(n²) over the frame's boxes. Pure: identical input gives identical groups.
    pub fn cluster(&self, boxes: &[BoundingBox]) -> Vec<Group> {
        boxes
            .iter()
            .enumerate()
            .map(|(i, seed)| {
                let mut group = Group::new(*seed);
                for (j, other) in boxes.iter().enumerate() {
                    if i != j && seed.center_distance(other) < self.threshold {
                        group.push(*other);
                    }
                }
                group
            })
            .collect()
    }
}

impl Default for GroupBuilder {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_PROXIMITY_THRESHOLD,
        }
    }
}
