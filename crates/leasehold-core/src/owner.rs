//! Process-local table of held leases
//!
//! One shared map, resource to ownership record, mutated concurrently by
//! every calling task and by the renewal daemon. Each operation is atomic
//! per resource key (DashMap shard lock); resources are independent, so no
//! cross-key coordination exists.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::model::OwnershipRecord;

/// Outcome of a release against the local table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// No record for the resource, or the caller identity does not hold it
    NotHeld,
    /// A nested hold remains; the count after the decrement
    StillHeld(u32),
    /// The count reached zero; the record is gone and the lease token is
    /// handed back for the remote release
    Released(String),
}

/// Concurrent map of the resources this process believes it holds
pub struct LockOwnerTable {
    records: DashMap<String, OwnershipRecord>,
}

impl LockOwnerTable {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Record a freshly granted lease. Overwrites a stale record left behind
    /// by a lease the store already expired; the store is the source of truth.
    pub fn insert_owner(&self, record: OwnershipRecord) {
        self.records.insert(record.resource.clone(), record);
    }

    /// Reentrant fast path: bump the count iff `owner` already holds the resource
    pub fn try_reenter(&self, resource: &str, owner: &str) -> bool {
        match self.records.get_mut(resource) {
            Some(mut record) if record.owner == owner => {
                record.reference_count += 1;
                true
            }
            _ => false,
        }
    }

    /// Decrement the hold for `owner`, removing the record at zero
    pub fn release(&self, resource: &str, owner: &str) -> ReleaseOutcome {
        match self.records.entry(resource.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().owner != owner {
                    return ReleaseOutcome::NotHeld;
                }
                if occupied.get().reference_count > 1 {
                    let record = occupied.get_mut();
                    record.reference_count -= 1;
                    ReleaseOutcome::StillHeld(record.reference_count)
                } else {
                    let record = occupied.remove();
                    ReleaseOutcome::Released(record.token)
                }
            }
            Entry::Vacant(_) => ReleaseOutcome::NotHeld,
        }
    }

    /// Update the renewal timestamp iff the lease token is unchanged.
    /// A mismatch means the record was released and re-acquired mid-renewal.
    pub fn mark_renewed(&self, resource: &str, token: &str, now: i64) -> bool {
        match self.records.get_mut(resource) {
            Some(mut record) if record.token == token => {
                record.last_renewed_at = now;
                record.renewal_count += 1;
                true
            }
            _ => false,
        }
    }

    /// Remove the record iff it still carries `token`; the daemon's eviction path
    pub fn evict(&self, resource: &str, token: &str) -> bool {
        self.records
            .remove_if(resource, |_, record| record.token == token)
            .is_some()
    }

    /// Remove the record unconditionally, returning it if present
    pub fn remove(&self, resource: &str) -> Option<OwnershipRecord> {
        self.records.remove(resource).map(|(_, record)| record)
    }

    pub fn get(&self, resource: &str) -> Option<OwnershipRecord> {
        self.records.get(resource).map(|record| record.clone())
    }

    pub fn contains(&self, resource: &str) -> bool {
        self.records.contains_key(resource)
    }

    /// Clone out every record; the daemon sweeps over this snapshot
    pub fn snapshot(&self) -> Vec<OwnershipRecord> {
        self.records
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for LockOwnerTable {
    fn default() -> Self {
        Self::new()
    }
}
