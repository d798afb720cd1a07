//! Lock manager and the per-acquisition lock handle
//!
//! `LockManager` wires the pieces together: the injected store, the owner
//! table, the statistics collector, and the renewal daemon it starts on
//! construction. `Lock` is the surface application code acquires through.
//! No process-wide singletons; every manager owns its own state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use uuid::Uuid;

use leasehold_common::{LeaseholdError, is_valid, now_millis};

use crate::model::{LockConfig, LockStats, OwnershipRecord};
use crate::owner::{LockOwnerTable, ReleaseOutcome};
use crate::renew::RenewalDaemon;
use crate::store::LockStore;

/// Internal counters, snapshotted by `LockManager::stats`
#[derive(Default)]
pub(crate) struct LockStatsCollector {
    pub(crate) total_acquisitions: AtomicU64,
    pub(crate) reentrant_acquisitions: AtomicU64,
    pub(crate) failed_acquisitions: AtomicU64,
    pub(crate) total_releases: AtomicU64,
    pub(crate) total_renewals: AtomicU64,
    pub(crate) failed_renewals: AtomicU64,
    pub(crate) evictions: AtomicU64,
}

/// Owns the lease state for one process and the daemon that keeps it honest
pub struct LockManager {
    store: Arc<dyn LockStore>,
    table: Arc<LockOwnerTable>,
    config: LockConfig,
    stats: Arc<LockStatsCollector>,
    daemon: RenewalDaemon,
}

impl LockManager {
    /// Validate the configuration and start the renewal daemon.
    /// Must be called from within a tokio runtime.
    pub fn new(store: Arc<dyn LockStore>, config: LockConfig) -> Result<Self, LeaseholdError> {
        config.validate()?;

        let table = Arc::new(LockOwnerTable::new());
        let stats = Arc::new(LockStatsCollector::default());
        let daemon = RenewalDaemon::start(
            table.clone(),
            store.clone(),
            config.clone(),
            stats.clone(),
        );

        Ok(Self {
            store,
            table,
            config,
            stats,
            daemon,
        })
    }

    /// Handle for one resource and owner identity
    ///
    /// Handles are cheap and share the manager's state; two handles with the
    /// same owner identity are the same logical owner. The identity is
    /// opaque: a task id, a connection id, whatever the caller considers
    /// "the same holder" for reentrancy.
    pub fn lock(
        &self,
        resource: impl Into<String>,
        owner: impl Into<String>,
    ) -> Result<Lock, LeaseholdError> {
        let resource = resource.into();
        let owner = owner.into();
        if resource.is_empty() || !is_valid(&resource) {
            return Err(LeaseholdError::IllegalArgument(format!(
                "invalid resource name '{}'",
                resource
            )));
        }
        if owner.is_empty() {
            return Err(LeaseholdError::IllegalArgument(
                "owner identity must not be empty".to_string(),
            ));
        }

        Ok(Lock {
            resource,
            owner,
            store: self.store.clone(),
            table: self.table.clone(),
            config: self.config.clone(),
            stats: self.stats.clone(),
        })
    }

    /// Snapshot of the ownership record for one resource, if held
    pub fn get(&self, resource: &str) -> Option<OwnershipRecord> {
        self.table.get(resource)
    }

    /// Snapshot of every lease this process currently holds
    pub fn held(&self) -> Vec<OwnershipRecord> {
        self.table.snapshot()
    }

    /// Admin operation: drop the local record regardless of its reference
    /// count and release the lease remotely. Returns whether a record existed.
    pub async fn force_release(&self, resource: &str) -> bool {
        match self.table.remove(resource) {
            Some(record) => {
                self.stats.total_releases.fetch_add(1, Ordering::Relaxed);
                match self.store.release(&record.resource, &record.token).await {
                    Ok(released) => {
                        debug!(resource = %resource, released, "force released");
                    }
                    Err(e) => {
                        warn!(
                            resource = %resource,
                            error = %e,
                            "store release failed during force release"
                        );
                    }
                }
                true
            }
            None => false,
        }
    }

    pub fn stats(&self) -> LockStats {
        LockStats {
            active_locks: self.table.len() as u32,
            total_acquisitions: self.stats.total_acquisitions.load(Ordering::Relaxed),
            reentrant_acquisitions: self.stats.reentrant_acquisitions.load(Ordering::Relaxed),
            failed_acquisitions: self.stats.failed_acquisitions.load(Ordering::Relaxed),
            total_releases: self.stats.total_releases.load(Ordering::Relaxed),
            total_renewals: self.stats.total_renewals.load(Ordering::Relaxed),
            failed_renewals: self.stats.failed_renewals.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
        }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Stop the renewal daemon. Held leases stay in the table but are no
    /// longer renewed; the store expires them on its own schedule.
    pub fn shutdown(&self) {
        self.daemon.stop();
    }
}

/// Per-acquisition handle over one resource for one owner identity
pub struct Lock {
    resource: String,
    owner: String,
    store: Arc<dyn LockStore>,
    table: Arc<LockOwnerTable>,
    config: LockConfig,
    stats: Arc<LockStatsCollector>,
}

impl Lock {
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Single acquisition attempt
    ///
    /// The reentrant fast path is consulted first (no remote call); otherwise
    /// a fresh token is minted and offered to the store. Store transport
    /// errors are treated as contention, not surfaced.
    pub async fn try_acquire(&self) -> bool {
        if self.config.reentrant && self.table.try_reenter(&self.resource, &self.owner) {
            self.stats
                .reentrant_acquisitions
                .fetch_add(1, Ordering::Relaxed);
            self.stats.total_acquisitions.fetch_add(1, Ordering::Relaxed);
            debug!(resource = %self.resource, owner = %self.owner, "reentrant acquire");
            return true;
        }

        let token = Uuid::new_v4().to_string();
        let granted = match self
            .store
            .acquire(&self.resource, &token, self.config.ttl_ms)
            .await
        {
            Ok(granted) => granted,
            Err(e) => {
                warn!(resource = %self.resource, error = %e, "store acquire failed");
                false
            }
        };

        if !granted {
            self.stats.failed_acquisitions.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        self.table.insert_owner(OwnershipRecord::new(
            &self.resource,
            &token,
            &self.owner,
            now_millis(),
        ));
        self.stats.total_acquisitions.fetch_add(1, Ordering::Relaxed);
        debug!(resource = %self.resource, owner = %self.owner, "lock acquired");
        true
    }

    /// One attempt, no retry; failure is an error to the caller.
    /// Callers wanting retry semantics use `try_acquire_timeout`.
    pub async fn acquire(&self) -> Result<(), LeaseholdError> {
        if self.try_acquire().await {
            Ok(())
        } else {
            Err(LeaseholdError::NotAcquired(self.resource.clone()))
        }
    }

    /// Poll until acquired or the deadline elapses
    ///
    /// Sleeps the configured poll interval between attempts, never past the
    /// deadline. Waits longer than `max_wait_ms` are rejected outright.
    /// Dropping the future aborts the wait.
    pub async fn try_acquire_timeout(&self, timeout: Duration) -> Result<bool, LeaseholdError> {
        let requested_ms = timeout.as_millis() as u64;
        if requested_ms > self.config.max_wait_ms {
            return Err(LeaseholdError::WaitTimeoutExceeded {
                requested_ms,
                max_ms: self.config.max_wait_ms,
            });
        }

        let deadline = Instant::now() + timeout;
        loop {
            if self.try_acquire().await {
                return Ok(true);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            tokio::time::sleep(remaining.min(self.config.poll_interval())).await;
        }
    }

    /// Decrement the local hold; at zero, remove the record and release the
    /// lease remotely. Releasing without holding is a no-op, never an error,
    /// and a failed remote release is only logged: the store expires the
    /// lease on its own schedule.
    pub async fn release(&self) {
        match self.table.release(&self.resource, &self.owner) {
            ReleaseOutcome::NotHeld => {
                debug!(resource = %self.resource, owner = %self.owner, "release without hold, ignored");
            }
            ReleaseOutcome::StillHeld(count) => {
                debug!(resource = %self.resource, reference_count = count, "nested release");
            }
            ReleaseOutcome::Released(token) => {
                self.stats.total_releases.fetch_add(1, Ordering::Relaxed);
                match self.store.release(&self.resource, &token).await {
                    Ok(true) => {
                        debug!(resource = %self.resource, owner = %self.owner, "lock released");
                    }
                    Ok(false) => {
                        debug!(resource = %self.resource, "store entry already gone on release");
                    }
                    Err(e) => {
                        warn!(
                            resource = %self.resource,
                            error = %e,
                            "store release failed; lease will expire on its own"
                        );
                    }
                }
            }
        }
    }

    /// Whether this owner identity currently holds a local record
    pub fn is_held_locally(&self) -> bool {
        self.table
            .get(&self.resource)
            .map(|record| record.owner == self.owner)
            .unwrap_or(false)
    }
}
