/// Maximum center-to-center distance (pixels) for two boxes to share a group.
pub const DEFAULT_PROXIMITY_THRESHOLD: f64 = 50.0;

/// Consecutive frames a group key must reappear in before it is a crowd.
pub const DEFAULT_PERSISTENCE_THRESHOLD: u32 = 10;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// COCO class index for "person".
pub const DEFAULT_PERSON_CLASS_ID: u32 = 0;

pub const DEFAULT_LOG_PATH: &str = "results/crowd_detection_log.csv";

pub const LOG_HEADER: [&str; 2] = ["Frame Number", "Person Count"];

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
