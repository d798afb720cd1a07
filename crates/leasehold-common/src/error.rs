//! Error types for Leasehold
//!
//! This module defines `LeaseholdError`, the application-specific error enum.
//! Remote store failures are deliberately absent: the lock layer absorbs them
//! into boolean outcomes, so only caller programming errors surface here.

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum LeaseholdError {
    #[error("caused: {0}")]
    IllegalArgument(String),

    #[error("invalid lock configuration: {0}")]
    InvalidConfig(String),

    #[error("requested wait of {requested_ms}ms exceeds the configured maximum of {max_ms}ms")]
    WaitTimeoutExceeded { requested_ms: u64, max_ms: u64 },

    #[error("lock '{0}' could not be acquired")]
    NotAcquired(String),
}
