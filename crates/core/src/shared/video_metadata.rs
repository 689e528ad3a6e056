use std::path::PathBuf;

/// Stream-level facts reported by a [`VideoReader`](crate::video::domain::video_reader::VideoReader).
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    /// 0.0 when the source has no timing (image sequences).
    pub fps: f64,
    /// 0 when the container does not report a frame count.
    pub total_frames: usize,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Timestamp in seconds of a one-based frame number, if the source is timed.
    pub fn timestamp_secs(&self, frame_number: u64) -> Option<f64> {
        if self.fps > 0.0 && frame_number > 0 {
            Some((frame_number - 1) as f64 / self.fps)
        } else {
            None
        }
    }
}
