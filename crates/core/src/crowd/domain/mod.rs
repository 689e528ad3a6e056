pub mod crowd_event;
pub mod event_sink;
pub mod group;
pub mod group_builder;
pub mod persistence_tracker;
