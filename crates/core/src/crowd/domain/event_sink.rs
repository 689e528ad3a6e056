use super::crowd_event::CrowdEvent;

/// Destination for crowd events.
///
/// `record` is called once per frame, possibly with an empty slice.
pub trait EventSink: Send {
    fn record(&mut self, events: &[CrowdEvent]) -> Result<(), Box<dyn std::error::Error>>;

    /// Flushes buffered output. Default: no-op.
    fn finish(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}
