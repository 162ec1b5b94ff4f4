//! Error types for table and EBR configuration.
//!
//! Per the failure model, only setup-time mistakes are represented as
//! [`Result`]s. Allocation failure and an already-registered thread
//! exceeding the configured ceiling are fatal and abort the process
//! rather than unwind, because the library does not attempt degraded
//! operation once those happen.

use thiserror::Error;

/// Errors that can occur while building a [`crate::config::TableConfig`]
/// or registering a thread with an [`crate::epoch::Ebr`] context.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum ConfigError {
    /// The initial store size exponent produced a bucket count that
    /// isn't a power of two, or was zero.
    #[error("initial size exponent {0} is invalid (must be in 1..=32)")]
    InvalidSizeExponent(u32),

    /// `max_threads` was zero.
    #[error("max_threads must be nonzero")]
    ZeroMaxThreads,

    /// The retirement-scan frequency was zero or not a power of two.
    #[error("retire_scan_frequency {0} must be a nonzero power of two")]
    InvalidScanFrequency(usize),

    /// A thread attempted to register after `max_threads` slots were
    /// already handed out. This is the one `ConfigError` variant that
    /// can occur after setup, at thread registration time, as specified.
    #[error("thread registration exceeded the configured max_threads ({0})")]
    ThreadLimitExceeded(usize),
}
