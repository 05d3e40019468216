//! Service-level error type.

use courier_core::StoreError;
use courier_queue::QueueError;
use courier_scheduler::SchedulerError;
use thiserror::Error;

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by the notification service facade.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Referenced job does not exist
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
