use crate::shared::frame::Frame;

use super::detection::Detection;

/// Domain interface for object detection on a frame.
///
/// Implementations return every detection they produce; person and
/// confidence filtering happens downstream in
/// [`PersonFilter`](super::detection::PersonFilter). Detectors may keep
/// state between frames, hence `&mut self`.
pub trait PersonDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;
}
