//! Job queue for the Courier notification pipeline.
//!
//! A single [`JobQueue`] contract with two interchangeable backends:
//!
//! - [`RedisQueue`] — durable, with a bounded worker pool, automatic retries
//!   with fixed or exponential backoff, and retention trimming of terminal
//!   jobs.
//! - [`MemoryQueue`] — the in-process fallback used when no broker is
//!   configured; processes serially and immediately, keeps failed jobs
//!   parked for manual retry.
//!
//! Consumers hold an `Arc<dyn JobQueue>` selected at startup and never
//! branch on the backend.
//!
//! ## Quick Start
//!
//! ```
//! use courier_queue::{JobOptions, JobPayload, JobState, MemoryQueue, JobQueue, job_handler};
//! use uuid::Uuid;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), courier_queue::QueueError> {
//! let queue = MemoryQueue::new("notification:queue");
//!
//! queue
//!     .register_processor(
//!         1,
//!         job_handler(|job| async move {
//!             // deliver the notification for job.task_id() here
//!             Ok(serde_json::json!({ "success": true }))
//!         }),
//!     )
//!     .await?;
//!
//! let job = queue
//!     .enqueue(JobPayload::scheduled(Uuid::new_v4()), JobOptions::default())
//!     .await?;
//! assert_eq!(job.state, JobState::Waiting);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod job;
pub mod memory;
pub mod queue;
pub mod redis_queue;

pub use error::{QueueError, QueueResult};
pub use job::{
    Job, JobCounts, JobHandler, JobOptions, JobPayload, JobState, JobTrigger, job_handler,
};
pub use memory::MemoryQueue;
pub use queue::JobQueue;
pub use redis_queue::RedisQueue;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{QueueError, QueueResult};
    pub use crate::job::{
        Job, JobCounts, JobHandler, JobOptions, JobPayload, JobState, JobTrigger, job_handler,
    };
    pub use crate::memory::MemoryQueue;
    pub use crate::queue::JobQueue;
    pub use crate::redis_queue::RedisQueue;
}
