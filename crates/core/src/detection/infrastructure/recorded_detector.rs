use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::detection::domain::detection::Detection;
use crate::detection::domain::person_detector::PersonDetector;
use crate::shared::error::CrowdError;
use crate::shared::frame::Frame;

#[derive(Deserialize)]
struct RecordedFile {
    frames: Vec<Vec<Detection>>,
}

/// Replays detections captured earlier, one list per frame index.
///
/// File format:
///
/// ```json
/// {"frames": [[{"bbox": [10, 20, 40, 90], "class_id": 0, "confidence": 0.91}], []]}
/// ```
///
/// Frames past the end of the recording have no detections.
pub struct RecordedDetector {
    frames: Vec<Vec<Detection>>,
}

impl RecordedDetector {
    pub fn from_file(path: &Path) -> Result<Self, CrowdError> {
        let json = fs::read_to_string(path).map_err(|e| CrowdError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let recorded: RecordedFile =
            serde_json::from_str(&json).map_err(|e| CrowdError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;
        log::info!(
            "Loaded {} recorded frames from {}",
            recorded.frames.len(),
            path.display()
        );
        Ok(Self::from_frames(recorded.frames))
    }

    pub fn from_frames(frames: Vec<Vec<Detection>>) -> Self {
        Self { frames }
    }

    /// Number of recorded frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl PersonDetector for RecordedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        match self.frames.get(frame.index()) {
            Some(detections) => Ok(detections.clone()),
            None => {
                log::debug!("No recorded detections for frame {}", frame.number());
                Ok(Vec::new())
            }
        }
    }
}
