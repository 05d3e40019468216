//! The backend-agnostic queue contract.

use crate::error::QueueResult;
use crate::job::{Job, JobCounts, JobHandler, JobOptions, JobPayload, JobState};
use async_trait::async_trait;
use std::time::Duration;

/// Uniform interface over the durable Redis queue and the in-memory
/// fallback.
///
/// Callers interact with jobs exclusively through this contract; job
/// internals are mutated only by the queue itself. Consumers hold an
/// `Arc<dyn JobQueue>` and never branch on the backend in use.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a job; the returned job is in the `Waiting` state.
    ///
    /// The in-memory backend immediately schedules asynchronous processing
    /// when a processor is registered.
    async fn enqueue(&self, payload: JobPayload, opts: JobOptions) -> QueueResult<Job>;

    /// Fetch a job by id.
    async fn get_job(&self, id: &str) -> QueueResult<Option<Job>>;

    /// Fetch jobs in any of the given states, ordered by enqueue timestamp,
    /// sliced to `[start, end)`.
    async fn get_jobs(
        &self,
        states: &[JobState],
        start: usize,
        end: usize,
        ascending: bool,
    ) -> QueueResult<Vec<Job>>;

    /// Per-state job counts. `delayed` and `paused` are always 0 for the
    /// in-memory backend.
    async fn get_job_counts(&self) -> QueueResult<JobCounts>;

    /// Register the processing handler.
    ///
    /// `concurrency` bounds the worker pool on the durable backend; the
    /// in-memory backend processes serially and ignores it. Jobs already
    /// waiting are picked up immediately.
    async fn register_processor(&self, concurrency: usize, handler: JobHandler)
    -> QueueResult<()>;

    /// Remove jobs in `state` whose `finished_on` is older than
    /// `now - grace`, at most `limit` of them. Returns the removed jobs.
    async fn clean(&self, grace: Duration, state: JobState, limit: usize)
    -> QueueResult<Vec<Job>>;

    /// Re-queue a failed job.
    ///
    /// Fails with [`crate::QueueError::InvalidState`] unless the job is
    /// currently `Failed`. On success the job is back in `Waiting` with
    /// `finished_on` and `return_value` cleared and `attempts_made`
    /// preserved.
    async fn retry(&self, id: &str) -> QueueResult<Job>;

    /// Remove a job regardless of state; returns whether it existed.
    async fn remove(&self, id: &str) -> QueueResult<bool>;

    /// Release underlying connections. Idempotent.
    async fn close(&self) -> QueueResult<()>;
}
