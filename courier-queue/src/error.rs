//! Error types for queue operations.

use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Queue-specific errors.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Redis error
    #[error("Queue backend error: {0}")]
    Backend(#[from] redis::RedisError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Job not found
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Operation requires a different job state (e.g. retry on a job that
    /// has not failed)
    #[error("Cannot retry job {id} in state {state}")]
    InvalidState { id: String, state: String },

    /// Handler returned an error while processing a job
    #[error("Job execution failed: {0}")]
    ExecutionFailed(String),

    /// A processor is already registered on this queue
    #[error("Processor already registered")]
    ProcessorAlreadyRegistered,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
