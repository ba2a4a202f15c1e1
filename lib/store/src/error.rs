//! Error types for the store crate.
//!
//! Backends report failures with [`StoreError`]. The [`TtlStore`] facade
//! turns everything except a failed `initialize` into absent values and
//! `false` results; `initialize` surfaces a `Report<StoreError>`.
//!
//! [`TtlStore`]: crate::TtlStore

use std::fmt;

/// Errors from key-value backend operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be brought up. Fatal at startup.
    Unavailable { backend: String, reason: String },
    /// Connection or timeout failure; the operation may succeed if retried.
    Transient { operation: String, reason: String },
    /// The backend has not been initialized (or has been closed).
    NotInitialized { backend: String },
    /// Non-retryable backend failure (bad key, corrupt entry, ...).
    Backend { operation: String, reason: String },
}

impl StoreError {
    /// Returns true if retrying the operation could help.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { backend, reason } => {
                write!(f, "{backend} store unavailable: {reason}")
            }
            Self::Transient { operation, reason } => {
                write!(f, "transient failure during {operation}: {reason}")
            }
            Self::NotInitialized { backend } => {
                write!(f, "{backend} store is not initialized")
            }
            Self::Backend { operation, reason } => {
                write!(f, "{operation} failed: {reason}")
            }
        }
    }
}

impl std::error::Error for StoreError {}
