//! Error types for notification processing.

use courier_core::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// Result type for notification processing.
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Errors raised while processing a notification job.
///
/// Each of these aborts the current job only; the queue applies its own
/// retry policy on top.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The job references a task that no longer exists
    #[error("Task not found or inaccessible: {0}")]
    TaskNotFound(Uuid),

    /// The task's recipient list parsed to nothing
    #[error("No recipients specified in task")]
    NoRecipients,

    /// None of the listed recipient ids resolved to a deliverable recipient
    #[error("No valid recipients found for notification")]
    NoValidRecipients,

    /// Every resolved recipient failed to receive the notification
    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    /// Store failure outside the cases above
    #[error(transparent)]
    Store(#[from] StoreError),
}
