//! Error type shared by all store contracts.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by task/template/recipient/log stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness or state conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Underlying storage failure
    #[error("Storage error: {0}")]
    Backend(String),
}
