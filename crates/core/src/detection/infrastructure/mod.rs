pub mod execution_provider;
pub mod onnx_yolo_detector;
pub mod recorded_detector;
