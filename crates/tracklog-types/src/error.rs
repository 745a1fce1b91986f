//! Error types for tracklog-types.

use thiserror::Error;

/// Errors from interpreting stored timestamps.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TimeError {
    /// The epoch-millisecond value cannot be represented as a calendar time.
    #[error("timestamp out of range: {0}")]
    OutOfRange(i64),
}
