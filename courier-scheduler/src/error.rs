//! Error types for scheduling operations.

use courier_core::StoreError;
use courier_queue::QueueError;
use thiserror::Error;
use uuid::Uuid;

/// Result type for scheduling operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Manual trigger references an unknown task
    #[error("Task {0} not found")]
    TaskNotFound(Uuid),

    /// Manual trigger conflicts with an existing waiting/active job
    #[error("Task {0} is already queued for processing")]
    AlreadyQueued(Uuid),

    /// Manual trigger for a task that already ran to completion
    #[error("Task {0} is already completed")]
    TaskCompleted(Uuid),

    /// `start` on a running scheduler
    #[error("Scheduler already running")]
    AlreadyRunning,

    /// `stop` on a stopped scheduler
    #[error("Scheduler not running")]
    NotRunning,

    /// Task store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Queue failure
    #[error(transparent)]
    Queue(#[from] QueueError),
}
