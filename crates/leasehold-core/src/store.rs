//! LockStore contract and the in-memory reference store
//!
//! The store is the single arbiter of cross-process exclusion. Each of the
//! three operations must execute as one atomic step on the store side
//! (conditional create, compare-and-delete, compare-and-extend); a
//! non-atomic adapter breaks the mutual-exclusion guarantee. All three are
//! idempotent with respect to retries for a given token.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use leasehold_common::now_millis;

/// Atomic lease operations provided by an external store
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Create the resource entry with value `token` and expiry `ttl_ms`,
    /// only if no live entry exists. Returns whether this call created it.
    async fn acquire(&self, resource: &str, token: &str, ttl_ms: u64) -> anyhow::Result<bool>;

    /// Delete the resource entry only if its current value equals `token`.
    /// Returns whether deletion occurred.
    async fn release(&self, resource: &str, token: &str) -> anyhow::Result<bool>;

    /// Extend the expiry of the resource entry only if its current value
    /// equals `token`. Returns whether the extension occurred.
    async fn renew(&self, resource: &str, token: &str, ttl_ms: u64) -> anyhow::Result<bool>;
}

/// A granted lease as the store records it
#[derive(Debug, Clone)]
struct LeaseEntry {
    token: String,
    expires_at: i64,
}

impl LeaseEntry {
    fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

/// In-memory `LockStore` implementation
///
/// Expiry is honored at access time: an entry past its deadline is treated
/// as absent by all three operations, so an expired lease can be reclaimed
/// without a background reaper. Used by tests and single-store embeddings;
/// production deployments wire the trait to their shared store.
pub struct MemoryLockStore {
    leases: DashMap<String, LeaseEntry>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self {
            leases: DashMap::new(),
        }
    }

    /// Number of entries currently recorded, expired ones included
    pub fn len(&self) -> usize {
        self.leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }
}

impl Default for MemoryLockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn acquire(&self, resource: &str, token: &str, ttl_ms: u64) -> anyhow::Result<bool> {
        let now = now_millis();
        let lease = LeaseEntry {
            token: token.to_string(),
            expires_at: now + ttl_ms as i64,
        };

        // The entry guard holds the shard lock, making check-then-create atomic
        match self.leases.entry(resource.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(lease);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(lease);
                Ok(true)
            }
        }
    }

    async fn release(&self, resource: &str, token: &str) -> anyhow::Result<bool> {
        let now = now_millis();
        let removed = self
            .leases
            .remove_if(resource, |_, lease| {
                !lease.is_expired(now) && lease.token == token
            })
            .is_some();
        Ok(removed)
    }

    async fn renew(&self, resource: &str, token: &str, ttl_ms: u64) -> anyhow::Result<bool> {
        let now = now_millis();
        match self.leases.get_mut(resource) {
            Some(mut lease) if !lease.is_expired(now) && lease.token == token => {
                lease.expires_at = now + ttl_ms as i64;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
