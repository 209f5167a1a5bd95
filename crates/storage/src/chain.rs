//! Per-row version chains

use std::collections::VecDeque;

use tally_core::{Version, VersionedValue};

/// All committed versions of one row, newest first
///
/// Versions are pushed in commit order, so the chain is strictly decreasing
/// from front to back.
#[derive(Debug, Clone)]
pub struct VersionChain {
    versions: VecDeque<VersionedValue>,
}

impl VersionChain {
    /// Create a chain holding a single version
    pub fn new(value: VersionedValue) -> Self {
        let mut versions = VecDeque::with_capacity(4);
        versions.push_front(value);
        Self { versions }
    }

    /// Add a new version (must be newer than every existing version)
    pub fn push(&mut self, value: VersionedValue) {
        debug_assert!(
            self.latest().map_or(true, |v| v.version < value.version),
            "versions must be pushed in commit order"
        );
        self.versions.push_front(value);
    }

    /// Newest committed version
    pub fn latest(&self) -> Option<&VersionedValue> {
        self.versions.front()
    }

    /// Newest version at or before `max_version`
    pub fn get_at_version(&self, max_version: Version) -> Option<&VersionedValue> {
        self.versions.iter().find(|v| v.version <= max_version)
    }

    /// Number of versions kept
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Whether the chain is empty
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}
