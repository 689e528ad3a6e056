pub mod csv_event_sink;
