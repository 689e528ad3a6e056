use serde::{Deserialize, Serialize};

use crate::shared::bounding_box::BoundingBox;
use crate::shared::config::CrowdConfig;
use crate::shared::constants::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_PERSON_CLASS_ID};

/// One detector output: a box with its class label and score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_id: u32,
    pub confidence: f64,
}

impl Detection {
    pub fn new(bbox: BoundingBox, class_id: u32, confidence: f64) -> Self {
        Self {
            bbox,
            class_id,
            confidence,
        }
    }
}

/// Keeps person detections at or above a confidence threshold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PersonFilter {
    pub person_class_id: u32,
    pub confidence_threshold: f64,
}

impl PersonFilter {
    pub fn new(person_class_id: u32, confidence_threshold: f64) -> Self {
        Self {
            person_class_id,
            confidence_threshold,
        }
    }

    pub fn from_config(config: &CrowdConfig) -> Self {
        Self::new(config.person_class_id, config.confidence_threshold)
    }

    pub fn accepts(&self, detection: &Detection) -> bool {
        detection.class_id == self.person_class_id
            && detection.confidence >= self.confidence_threshold
    }

    /// Person boxes in detector order, truncated to whole pixels.
    ///
    /// Every detector's output passes through here, so live and recorded
    /// detections are keyed the same way.
    pub fn apply(&self, detections: &[Detection]) -> Vec<BoundingBox> {
        detections
            .iter()
            .filter(|d| self.accepts(d))
            .map(|d| d.bbox.truncated())
            .collect()
    }
}

impl Default for PersonFilter {
    fn default() -> Self {
        Self::new(DEFAULT_PERSON_CLASS_ID, DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn det(class_id: u32, confidence: f64) -> Detection {
        Detection::new(
            BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap(),
            class_id,
            confidence,
        )
    }

    #[rstest]
    #[case::person_above(0, 0.9, true)]
    #[case::person_at_threshold(0, 0.5, true)]
    #[case::person_below(0, 0.49, false)]
    #[case::other_class(2, 0.99, false)]
    fn test_accepts(#[case] class_id: u32, #[case] confidence: f64, #[case] expected: bool) {
        assert_eq!(PersonFilter::default().accepts(&det(class_id, confidence)), expected);
    }

    #[test]
    fn test_apply_preserves_order() {
        let a = Detection::new(BoundingBox::new(0.0, 0.0, 5.0, 5.0).unwrap(), 0, 0.8);
        let car = Detection::new(BoundingBox::new(1.0, 1.0, 6.0, 6.0).unwrap(), 2, 0.9);
        let b = Detection::new(BoundingBox::new(2.0, 2.0, 7.0, 7.0).unwrap(), 0, 0.7);

        let boxes = PersonFilter::default().apply(&[a.clone(), car, b.clone()]);
        assert_eq!(boxes, vec![a.bbox, b.bbox]);
    }

    #[test]
    fn test_custom_person_class() {
        let filter = PersonFilter::new(1, 0.3);
        assert!(filter.accepts(&det(1, 0.3)));
        assert!(!filter.accepts(&det(0, 0.9)));
    }

    #[test]
    fn test_from_config() {
        let config = CrowdConfig {
            person_class_id: 3,
            confidence_threshold: 0.25,
            ..CrowdConfig::default()
        };
        assert_eq!(PersonFilter::from_config(&config), PersonFilter::new(3, 0.25));
    }

    #[test]
    fn test_apply_truncates_to_whole_pixels() {
        let drifting = Detection::new(BoundingBox::new(10.6, 20.2, 40.6, 90.9).unwrap(), 0, 0.9);
        let boxes = PersonFilter::default().apply(&[drifting]);
        assert_eq!(boxes[0].as_array(), [10.0, 20.0, 40.0, 90.0]);
    }

    #[test]
    fn test_apply_empty() {
        assert!(PersonFilter::default().apply(&[]).is_empty());
    }

    #[test]
    fn test_detection_deserializes_from_json() {
        let d: Detection =
            serde_json::from_str(r#"{"bbox": [1, 2, 30, 40], "class_id": 0, "confidence": 0.75}"#)
                .unwrap();
        assert_eq!(d.bbox.as_array(), [1.0, 2.0, 30.0, 40.0]);
        assert_eq!(d.class_id, 0);
    }
}
