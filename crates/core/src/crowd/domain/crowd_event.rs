use super::group::Group;

/// A group reported as a crowd on one frame.
///
/// A crowd that keeps qualifying is reported again on every frame.
#[derive(Clone, Debug, PartialEq)]
pub struct CrowdEvent {
    pub frame_number: u64,
    pub member_count: usize,
    pub group: Group,
}

impl CrowdEvent {
    pub fn new(frame_number: u64, group: Group) -> Self {
        Self {
            frame_number,
            member_count: group.len(),
            group,
        }
    }

    /// One event per qualifying group, all stamped with `frame_number`.
    pub fn for_frame(frame_number: u64, crowds: Vec<Group>) -> Vec<CrowdEvent> {
        crowds
            .into_iter()
            .map(|g| CrowdEvent::new(frame_number, g))
            .collect()
    }
}
