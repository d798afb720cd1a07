//! Leasehold Core - lease-based distributed mutual exclusion
//!
//! This crate provides:
//! - The `LockStore` contract over an external atomic key/value store
//! - A process-local, refcounted table of held leases
//! - A background daemon that renews every held lease and evicts the ones
//!   that could not be renewed in time
//! - The `LockManager` / `Lock` surface applications acquire through
//!
//! The external store is the single source of truth for cross-process
//! exclusion; everything in this crate only optimizes in-process reentrancy
//! and keeps local belief of ownership honest.

pub mod manager;
pub mod metrics;
pub mod model;
pub mod owner;
pub mod renew;
pub mod store;

// Re-export commonly used types
pub use manager::{Lock, LockManager};
pub use model::{LockConfig, LockStats, OwnershipRecord};
pub use owner::{LockOwnerTable, ReleaseOutcome};
pub use renew::RenewalDaemon;
pub use store::{LockStore, MemoryLockStore};

// Re-export the shared error type
pub use leasehold_common::LeaseholdError;
