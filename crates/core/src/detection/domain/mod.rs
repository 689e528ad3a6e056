pub mod detection;
pub mod person_detector;
