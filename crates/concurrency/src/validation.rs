//! Conflict detection
//!
//! Three checks guard the counter:
//! - Row lock: a row carrying another open transaction's intent cannot be written
//! - First-updater-wins: under snapshot levels, a row committed after the
//!   snapshot cannot be written
//! - Read-set validation (serializable only): every row read must still be at
//!   the version that was read when the transaction commits
//!
//! Blind writes under read committed and read uncommitted pass all three,
//! which is exactly how the lost update happens.

use std::collections::HashMap;

use tally_core::{ConflictKind, CounterName, Error, Version};
use tally_storage::{VersionedStore, WriteIntent};

/// Types of conflicts that can occur during a write or at commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictType {
    /// A row read by the transaction changed before commit
    ReadWriteConflict {
        /// The row that changed
        counter: CounterName,
        /// Version recorded in the read set
        read_version: Version,
        /// Current committed version at validation time
        current_version: Version,
    },

    /// The row was committed by another transaction after the snapshot
    ConcurrentUpdate {
        /// The row being written
        counter: CounterName,
        /// Snapshot the writer reads from
        snapshot_version: Version,
        /// Newest committed version of the row
        current_version: Version,
    },

    /// Another open transaction holds an uncommitted write on the row
    RowLocked {
        /// The row being written
        counter: CounterName,
        /// Transaction holding the write intent
        holder_txn: u64,
    },
}

impl ConflictType {
    /// Row the conflict was detected on
    pub fn counter(&self) -> &CounterName {
        match self {
            ConflictType::ReadWriteConflict { counter, .. }
            | ConflictType::ConcurrentUpdate { counter, .. }
            | ConflictType::RowLocked { counter, .. } => counter,
        }
    }

    /// Public classification of the conflict
    pub fn kind(&self) -> ConflictKind {
        match self {
            ConflictType::ReadWriteConflict { .. } => ConflictKind::StaleRead,
            ConflictType::ConcurrentUpdate { .. } => ConflictKind::ConcurrentUpdate,
            ConflictType::RowLocked { .. } => ConflictKind::RowLocked,
        }
    }

    /// Build a row-lock conflict from the intent that blocked the write
    pub fn row_locked(counter: &CounterName, holder: WriteIntent) -> Self {
        ConflictType::RowLocked {
            counter: counter.clone(),
            holder_txn: holder.txn_id,
        }
    }

    fn detail(&self) -> String {
        match self {
            ConflictType::ReadWriteConflict {
                read_version,
                current_version,
                ..
            } => format!("read {}, now {}", read_version, current_version),
            ConflictType::ConcurrentUpdate {
                snapshot_version,
                current_version,
                ..
            } => format!("snapshot {}, row at {}", snapshot_version, current_version),
            ConflictType::RowLocked { holder_txn, .. } => format!("held by txn {}", holder_txn),
        }
    }
}

impl From<ConflictType> for Error {
    fn from(conflict: ConflictType) -> Self {
        Error::write_conflict(conflict.counter().as_str(), conflict.kind(), conflict.detail())
    }
}

/// Result of transaction validation
///
/// Accumulates all conflicts found during validation.
/// A transaction commits only if `is_valid()` returns true.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// All conflicts detected during validation
    pub conflicts: Vec<ConflictType>,
}

impl ValidationResult {
    /// Create a successful validation result (no conflicts)
    pub fn ok() -> Self {
        ValidationResult {
            conflicts: Vec::new(),
        }
    }

    /// Create a validation result with a single conflict
    pub fn conflict(conflict: ConflictType) -> Self {
        ValidationResult {
            conflicts: vec![conflict],
        }
    }

    /// Check if validation passed (no conflicts)
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Merge another validation result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.conflicts.extend(other.conflicts);
    }

    /// Get the number of conflicts
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    /// First conflict, if any
    pub fn first(&self) -> Option<&ConflictType> {
        self.conflicts.first()
    }
}

/// Validate the read set against current storage state
///
/// For each row read, the current committed version must equal the version
/// that was read. A row read as absent (version 0) conflicts if it now exists.
pub fn validate_read_set(
    read_set: &HashMap<CounterName, Version>,
    store: &VersionedStore,
) -> ValidationResult {
    let mut result = ValidationResult::ok();

    for (counter, read_version) in read_set {
        let current_version = store.latest_version(counter);
        if current_version != *read_version {
            result.conflicts.push(ConflictType::ReadWriteConflict {
                counter: counter.clone(),
                read_version: *read_version,
                current_version,
            });
        }
    }

    result
}

/// First-updater-wins check for a write at `snapshot`
pub fn check_concurrent_update(
    counter: &CounterName,
    snapshot: Version,
    store: &VersionedStore,
) -> Option<ConflictType> {
    let current_version = store.latest_version(counter);
    if current_version > snapshot {
        Some(ConflictType::ConcurrentUpdate {
            counter: counter.clone(),
            snapshot_version: snapshot,
            current_version,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> CounterName {
        CounterName::default()
    }

    #[test]
    fn test_unchanged_read_set_is_valid() {
        let store = VersionedStore::new();
        let v1 = store.put(&counter(), 1);

        let mut read_set = HashMap::new();
        read_set.insert(counter(), v1);

        assert!(validate_read_set(&read_set, &store).is_valid());
    }

    #[test]
    fn test_changed_row_fails_validation() {
        let store = VersionedStore::new();
        let v1 = store.put(&counter(), 1);

        let mut read_set = HashMap::new();
        read_set.insert(counter(), v1);

        let v2 = store.put(&counter(), 2);
        let result = validate_read_set(&read_set, &store);

        assert_eq!(result.conflict_count(), 1);
        assert_eq!(
            result.first(),
            Some(&ConflictType::ReadWriteConflict {
                counter: counter(),
                read_version: v1,
                current_version: v2,
            })
        );
    }

    #[test]
    fn test_row_created_after_absent_read_conflicts() {
        let store = VersionedStore::new();

        let mut read_set = HashMap::new();
        read_set.insert(counter(), Version::ZERO);

        store.put(&counter(), 1);
        assert!(!validate_read_set(&read_set, &store).is_valid());
    }

    #[test]
    fn test_concurrent_update_detection() {
        let store = VersionedStore::new();
        let v1 = store.put(&counter(), 1);
        assert!(check_concurrent_update(&counter(), v1, &store).is_none());

        store.put(&counter(), 2);
        let conflict = check_concurrent_update(&counter(), v1, &store).unwrap();
        assert_eq!(conflict.kind(), ConflictKind::ConcurrentUpdate);
    }

    #[test]
    fn test_merge_accumulates() {
        let mut result = ValidationResult::ok();
        result.merge(ValidationResult::conflict(ConflictType::RowLocked {
            counter: counter(),
            holder_txn: 3,
        }));
        result.merge(ValidationResult::ok());
        assert_eq!(result.conflict_count(), 1);
        assert!(!result.is_valid());
    }

    #[test]
    fn test_conflict_converts_to_write_conflict_error() {
        let err: Error = ConflictType::RowLocked {
            counter: counter(),
            holder_txn: 3,
        }
        .into();
        assert!(err.is_write_conflict());
        assert_eq!(err.conflict_kind(), Some(ConflictKind::RowLocked));
        assert!(err.to_string().contains("held by txn 3"));
    }
}
