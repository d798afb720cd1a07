// Metric names and registration for the lock subsystem
// The renewal daemon publishes these through the `metrics` facade;
// installing an exporter is the embedder's responsibility.

use metrics::{describe_counter, describe_gauge};

/// Gauge: leases this process currently holds
pub const LOCKS_HELD: &str = "leasehold_locks_held";

/// Counter: successful lease renewals
pub const RENEWALS_TOTAL: &str = "leasehold_renewals_total";

/// Counter: ownership records evicted after missed renewals
pub const EVICTIONS_TOTAL: &str = "leasehold_evictions_total";

/// Register metric descriptions
/// Should be called once at application startup, after the exporter is installed
pub fn describe_metrics() {
    describe_gauge!(LOCKS_HELD, "Number of leases this process currently holds");
    describe_counter!(RENEWALS_TOTAL, "Total number of successful lease renewals");
    describe_counter!(
        EVICTIONS_TOTAL,
        "Total number of ownership records evicted after missed renewals"
    );
}
