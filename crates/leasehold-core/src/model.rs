//! Lock data model
//!
//! Configuration knobs, the per-resource ownership record, and the
//! statistics snapshot exposed by the manager.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use leasehold_common::LeaseholdError;

/// Configuration for the lock subsystem
///
/// All durations are milliseconds. The renewal and poll intervals must be
/// substantially shorter than the lease TTL; `validate` enforces the hard
/// ordering, picking sensible ratios is up to the deployment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LockConfig {
    /// Lease TTL in milliseconds (default: 30000ms)
    /// The store expires an unrenewed lease after this long
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,

    /// Renewal period in milliseconds (default: 10000ms)
    /// The daemon renews every held lease at this interval
    #[serde(default = "default_renew_interval_ms")]
    pub renew_interval_ms: u64,

    /// Poll interval for bounded waits in milliseconds (default: 100ms)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum wait accepted by `try_acquire_timeout` (default: 60000ms)
    /// Longer waits are rejected outright rather than silently capped
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,

    /// Whether nested acquires by the same owner identity succeed locally
    #[serde(default = "default_reentrant")]
    pub reentrant: bool,
}

fn default_ttl_ms() -> u64 {
    30000 // 30 seconds
}

fn default_renew_interval_ms() -> u64 {
    10000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_max_wait_ms() -> u64 {
    60000
}

fn default_reentrant() -> bool {
    true
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
            renew_interval_ms: default_renew_interval_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_ms: default_max_wait_ms(),
            reentrant: default_reentrant(),
        }
    }
}

impl LockConfig {
    /// Reject configurations that cannot keep a lease alive
    pub fn validate(&self) -> Result<(), LeaseholdError> {
        if self.ttl_ms == 0 {
            return Err(LeaseholdError::InvalidConfig(
                "ttl_ms must be positive".to_string(),
            ));
        }
        if self.renew_interval_ms == 0 || self.renew_interval_ms >= self.ttl_ms {
            return Err(LeaseholdError::InvalidConfig(format!(
                "renew_interval_ms ({}) must be positive and shorter than ttl_ms ({})",
                self.renew_interval_ms, self.ttl_ms
            )));
        }
        if self.poll_interval_ms == 0 || self.poll_interval_ms >= self.ttl_ms {
            return Err(LeaseholdError::InvalidConfig(format!(
                "poll_interval_ms ({}) must be positive and shorter than ttl_ms ({})",
                self.poll_interval_ms, self.ttl_ms
            )));
        }
        Ok(())
    }

    /// Get the lease TTL as Duration
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Get the renewal period as Duration
    pub fn renew_interval(&self) -> Duration {
        Duration::from_millis(self.renew_interval_ms)
    }

    /// Get the poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Get the maximum bounded wait as Duration
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

/// One resource this process currently believes it holds
///
/// A record exists in the owner table iff the process believes it holds the
/// resource's lease. The token is the only credential the store accepts for
/// release and renewal of that lease.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnershipRecord {
    /// Resource key in the store's keyspace
    pub resource: String,
    /// Lease credential, minted fresh on each free-to-held transition
    pub token: String,
    /// In-process identity allowed to reenter
    pub owner: String,
    /// Nested holds; at least 1 while the record exists
    pub reference_count: u32,
    /// Acquisition timestamp (Unix millis)
    pub acquired_at: i64,
    /// Updated only on a successful remote renewal
    pub last_renewed_at: i64,
    /// Number of successful renewals for this lease
    pub renewal_count: u32,
}

impl OwnershipRecord {
    pub fn new(
        resource: impl Into<String>,
        token: impl Into<String>,
        owner: impl Into<String>,
        now: i64,
    ) -> Self {
        Self {
            resource: resource.into(),
            token: token.into(),
            owner: owner.into(),
            reference_count: 1,
            acquired_at: now,
            last_renewed_at: now,
            renewal_count: 0,
        }
    }
}

/// Lock statistics snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockStats {
    /// Leases this process currently holds
    pub active_locks: u32,
    /// Successful acquisitions, reentrant ones included
    pub total_acquisitions: u64,
    /// Acquisitions satisfied by the local reentrant fast path
    pub reentrant_acquisitions: u64,
    /// Acquisition attempts the store rejected or failed
    pub failed_acquisitions: u64,
    /// Full releases (reference count reached zero)
    pub total_releases: u64,
    /// Successful lease renewals
    pub total_renewals: u64,
    /// Renewal attempts that were rejected or failed
    pub failed_renewals: u64,
    /// Ownership records evicted after missed renewals
    pub evictions: u64,
}
