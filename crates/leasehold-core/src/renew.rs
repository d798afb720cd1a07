//! Background lease renewal
//!
//! One long-lived loop per manager. Each period it renews every held lease,
//! then evicts the records whose lease could not be renewed within the TTL.
//! Eviction is the only unilateral safety mechanism against stale belief of
//! ownership: the daemon does not release evicted leases remotely (the store
//! expires them on its own schedule), it only stops this process from
//! believing it still holds them. The loop never terminates on a renewal
//! error; only the stop signal ends it.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use leasehold_common::now_millis;

use crate::manager::LockStatsCollector;
use crate::metrics::{EVICTIONS_TOTAL, LOCKS_HELD, RENEWALS_TOTAL};
use crate::model::LockConfig;
use crate::owner::LockOwnerTable;
use crate::store::LockStore;

/// Handle to the spawned renewal loop
pub struct RenewalDaemon {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl RenewalDaemon {
    /// Spawn the renewal loop. Must be called from within a tokio runtime.
    pub(crate) fn start(
        table: Arc<LockOwnerTable>,
        store: Arc<dyn LockStore>,
        config: LockConfig,
        stats: Arc<LockStatsCollector>,
    ) -> Self {
        let (stop_tx, mut stop_rx) = mpsc::channel(1);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.renew_interval());
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        Self::sweep(&table, store.as_ref(), &config, &stats).await;
                    }
                    _ = stop_rx.recv() => {
                        debug!("renewal daemon stopped");
                        break;
                    }
                }
            }
        });

        Self { stop_tx, handle }
    }

    /// One renewal pass followed by the eviction sweep
    async fn sweep(
        table: &LockOwnerTable,
        store: &dyn LockStore,
        config: &LockConfig,
        stats: &LockStatsCollector,
    ) {
        // Renewal pass over a snapshot; records added mid-pass are fresh
        // enough to wait for the next period.
        for record in table.snapshot() {
            match store
                .renew(&record.resource, &record.token, config.ttl_ms)
                .await
            {
                Ok(true) => {
                    table.mark_renewed(&record.resource, &record.token, now_millis());
                    stats.total_renewals.fetch_add(1, Ordering::Relaxed);
                    counter!(RENEWALS_TOTAL).increment(1);
                }
                Ok(false) => {
                    stats.failed_renewals.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        resource = %record.resource,
                        owner = %record.owner,
                        "lease renewal rejected by store"
                    );
                }
                Err(e) => {
                    stats.failed_renewals.fetch_add(1, Ordering::Relaxed);
                    error!(
                        resource = %record.resource,
                        owner = %record.owner,
                        error = %e,
                        "lease renewal failed"
                    );
                }
            }
        }

        // Eviction sweep: anything not renewed within the TTL is no longer
        // safe to hold. Token-checked removal, so a lease re-acquired since
        // the snapshot survives.
        let now = now_millis();
        for record in table.snapshot() {
            if now - record.last_renewed_at > config.ttl_ms as i64
                && table.evict(&record.resource, &record.token)
            {
                stats.evictions.fetch_add(1, Ordering::Relaxed);
                counter!(EVICTIONS_TOTAL).increment(1);
                warn!(
                    resource = %record.resource,
                    owner = %record.owner,
                    "lease lost, evicted local ownership record"
                );
            }
        }

        gauge!(LOCKS_HELD).set(table.len() as f64);
    }

    /// Signal the loop to exit after the current sweep
    pub fn stop(&self) {
        let _ = self.stop_tx.try_send(());
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
