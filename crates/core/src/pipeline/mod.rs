pub mod detect_crowds_use_case;
pub mod pipeline_logger;
