use std::collections::{HashMap, HashSet};

use crate::shared::config::CrowdConfig;
use crate::shared::constants::DEFAULT_PERSISTENCE_THRESHOLD;
use crate::shared::error::CrowdError;

use super::group::{Group, GroupKey, KeyPolicy};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct TrackedEntry {
    hits: u64,
    last_seen: u64,
}

/// Cross-frame hit counts per group key.
///
/// Owned by the caller's session loop and handed to every
/// [`PersistenceTracker::update`]; dropping or clearing it resets the session.
#[derive(Clone, Debug, Default)]
pub struct TrackedGroupState {
    entries: HashMap<GroupKey, TrackedEntry>,
    updates: u64,
}

impl TrackedGroupState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hit count for `key`, or `None` if it was never seen (or was evicted).
    pub fn count(&self, key: &GroupKey) -> Option<u64> {
        self.entries.get(key).map(|e| e.hits)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of `update` calls applied so far.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, u64)> {
        self.entries.iter().map(|(k, e)| (k, e.hits))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.updates = 0;
    }
}

/// What happens to keys that stop appearing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Keys live for the whole session; memory grows with distinct keys.
    #[default]
    Never,
    /// Drop keys that have not been seen in the last `n` updates.
    MaxIdleFrames(u64),
}

/// Decides which groups have persisted long enough to count as crowds.
///
/// A key's count grows by one for every frame it reappears in and never
/// resets or decays; missing a frame only stalls it. A key that occurs
/// several times within one frame counts once for that frame.
#[derive(Clone, Debug)]
pub struct PersistenceTracker {
    persistence_threshold: u32,
    key_policy: KeyPolicy,
    eviction: EvictionPolicy,
}

impl PersistenceTracker {
    pub fn new(persistence_threshold: u32) -> Result<Self, CrowdError> {
        if persistence_threshold == 0 {
            return Err(CrowdError::InvalidInput(
                "persistence threshold must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            persistence_threshold,
            key_policy: KeyPolicy::Exact,
            eviction: EvictionPolicy::Never,
        })
    }

    pub fn with_key_policy(mut self, policy: KeyPolicy) -> Result<Self, CrowdError> {
        if let KeyPolicy::Quantized { cell } = policy {
            if !cell.is_finite() || cell <= 0.0 {
                return Err(CrowdError::InvalidInput(format!(
                    "key quantization cell must be positive, got {cell}"
                )));
            }
        }
        self.key_policy = policy;
        Ok(self)
    }

    pub fn with_eviction(mut self, eviction: EvictionPolicy) -> Result<Self, CrowdError> {
        if eviction == EvictionPolicy::MaxIdleFrames(0) {
            return Err(CrowdError::InvalidInput(
                "idle eviction window must be at least 1 frame".to_string(),
            ));
        }
        self.eviction = eviction;
        Ok(self)
    }

    /// Tracker configured from a session config: exact keys unless
    /// `key_quantization` is set, no eviction unless `max_idle_frames` is.
    pub fn from_config(config: &CrowdConfig) -> Result<Self, CrowdError> {
        let key_policy = match config.key_quantization {
            Some(cell) => KeyPolicy::Quantized { cell },
            None => KeyPolicy::Exact,
        };
        let eviction = match config.max_idle_frames {
            Some(n) => EvictionPolicy::MaxIdleFrames(n),
            None => EvictionPolicy::Never,
        };
        Self::new(config.persistence_threshold)?
            .with_key_policy(key_policy)?
            .with_eviction(eviction)
    }

    pub fn persistence_threshold(&self) -> u32 {
        self.persistence_threshold
    }

    pub fn key_policy(&self) -> KeyPolicy {
        self.key_policy
    }

    pub fn eviction(&self) -> EvictionPolicy {
        self.eviction
    }

    /// Records this frame's groups and returns those that now qualify.
    ///
    /// Only keys present in `groups` can qualify; one group is returned per
    /// qualifying key, in order of first occurrence.
    pub fn update(&self, groups: &[Group], state: &mut TrackedGroupState) -> Vec<Group> {
        state.updates += 1;
        let now = state.updates;

        let mut seen: HashSet<GroupKey> = HashSet::with_capacity(groups.len());
        let mut qualifying = Vec::new();

        for group in groups {
            let key = group.key(self.key_policy);
            if seen.contains(&key) {
                continue;
            }
            let entry = state.entries.entry(key.clone()).or_insert(TrackedEntry {
                hits: 0,
                last_seen: now,
            });
            entry.hits += 1;
            entry.last_seen = now;

            if entry.hits >= u64::from(self.persistence_threshold) {
                qualifying.push(group.clone());
            }
            seen.insert(key);
        }

        if let EvictionPolicy::MaxIdleFrames(window) = self.eviction {
            let before = state.entries.len();
            state.entries.retain(|_, e| now - e.last_seen < window);
            let evicted = before - state.entries.len();
            if evicted > 0 {
                log::debug!("Evicted {evicted} idle group keys");
            }
        }

        qualifying
    }
}

impl Default for PersistenceTracker {
    fn default() -> Self {
        Self {
            persistence_threshold: DEFAULT_PERSISTENCE_THRESHOLD,
            key_policy: KeyPolicy::Exact,
            eviction: EvictionPolicy::Never,
        }
    }
}
