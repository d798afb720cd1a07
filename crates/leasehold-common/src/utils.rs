//! Utility functions for Leasehold
//!
//! Common helper functions used across the codebase.

use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Regex pattern for validating resource and owner identifiers
static VALID_PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new("^[a-zA-Z0-9_.:-]*$").expect("Invalid regex pattern"));

/// Validate a string contains only allowed characters
///
/// Allowed characters: alphanumeric, underscore, dot, colon, hyphen
///
/// # Examples
///
/// ```
/// use leasehold_common::is_valid;
///
/// assert!(is_valid("orders.shard-1"));
/// assert!(is_valid("worker:7"));
/// assert!(!is_valid("invalid/path"));
/// assert!(!is_valid("with spaces"));
/// ```
pub fn is_valid(str: &str) -> bool {
    VALID_PATTERN.is_match(str)
}

/// Current wall-clock time as Unix milliseconds
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
