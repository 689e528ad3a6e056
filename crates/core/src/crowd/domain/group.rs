use crate::shared::bounding_box::BoundingBox;

/// Boxes that sit close together in one frame.
///
/// The first member is the seed box the group was built around. Groups from
/// the same frame may share members.
#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    members: Vec<BoundingBox>,
}

impl Group {
    pub fn new(seed: BoundingBox) -> Self {
        Self {
            members: vec![seed],
        }
    }

    /// Builds a group from an explicit member list; `None` if it is empty.
    pub fn from_members(members: Vec<BoundingBox>) -> Option<Self> {
        if members.is_empty() {
            None
        } else {
            Some(Self { members })
        }
    }

    pub fn push(&mut self, member: BoundingBox) {
        self.members.push(member);
    }

    pub fn seed(&self) -> &BoundingBox {
        &self.members[0]
    }

    pub fn members(&self) -> &[BoundingBox] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, b: &BoundingBox) -> bool {
        self.members.contains(b)
    }

    pub fn key(&self, policy: KeyPolicy) -> GroupKey {
        GroupKey::derive(&self.members, policy)
    }
}

/// How a group's members are turned into its cross-frame identity.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum KeyPolicy {
    /// The sorted member boxes themselves. Any pixel of detector jitter
    /// produces a new key.
    #[default]
    Exact,
    /// Member coordinates snapped to a grid of `cell` pixels before sorting.
    Quantized { cell: f64 },
}

/// Order-independent identity of a group, used to match it across frames.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    Exact(Vec<BoundingBox>),
    Quantized(Vec<[i64; 4]>),
}

impl GroupKey {
    pub fn derive(members: &[BoundingBox], policy: KeyPolicy) -> Self {
        match policy {
            KeyPolicy::Exact => {
                let mut sorted = members.to_vec();
                sorted.sort();
                GroupKey::Exact(sorted)
            }
            KeyPolicy::Quantized { cell } => {
                let mut cells: Vec<[i64; 4]> = members
                    .iter()
                    .map(|b| b.as_array().map(|v| (v / cell).floor() as i64))
                    .collect();
                cells.sort_unstable();
                GroupKey::Quantized(cells)
            }
        }
    }

    /// Number of boxes the key was derived from.
    pub fn len(&self) -> usize {
        match self {
            GroupKey::Exact(boxes) => boxes.len(),
            GroupKey::Quantized(cells) => cells.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
