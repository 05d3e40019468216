//! In-memory queue backend.
//!
//! Used when no durable broker is configured, and as the reference
//! implementation of the [`JobQueue`] contract. Jobs live in a map with
//! per-state bookkeeping derived on demand; processing is scheduled
//! immediately on enqueue and serialized behind a mutex, so registered
//! concurrency is ignored. Failed jobs stay parked for manual retry — the
//! fallback applies no automatic backoff. Not durable: all jobs are lost on
//! restart.

use crate::error::{QueueError, QueueResult};
use crate::job::{Job, JobCounts, JobHandler, JobOptions, JobPayload, JobState};
use crate::queue::JobQueue;
use async_trait::async_trait;
use chrono::Utc;
use courier_log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// In-memory [`JobQueue`] implementation.
#[derive(Clone)]
pub struct MemoryQueue {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    jobs: RwLock<HashMap<String, Job>>,
    processor: RwLock<Option<JobHandler>>,
    counter: AtomicU64,
    /// Serializes processing attempts; the fallback has no worker pool
    processing: Mutex<()>,
}

impl MemoryQueue {
    /// Create an empty queue.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        info!(target: "courier::queue", "Initialized in-memory queue: {}", name);
        Self {
            inner: Arc::new(Inner {
                name,
                jobs: RwLock::new(HashMap::new()),
                processor: RwLock::new(None),
                counter: AtomicU64::new(0),
                processing: Mutex::new(()),
            }),
        }
    }

    fn spawn_dispatch(&self, id: String) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            Inner::process(inner, id).await;
        });
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl Inner {
    async fn process(inner: Arc<Inner>, id: String) {
        let _serial = inner.processing.lock().await;

        let handler = { inner.processor.read().await.clone() };
        let Some(handler) = handler else {
            return;
        };

        // Claim the job; a retry or remove may have raced us here
        let job = {
            let mut jobs = inner.jobs.write().await;
            match jobs.get_mut(&id) {
                Some(job) if job.state == JobState::Waiting => {
                    job.start();
                    job.clone()
                }
                _ => return,
            }
        };

        debug!(
            target: "courier::queue",
            "Queue {}: processing job {} (attempt {})",
            inner.name, job.id, job.attempts_made
        );

        let result = handler(job.clone()).await;

        let mut jobs = inner.jobs.write().await;
        if let Some(job) = jobs.get_mut(&id) {
            match result {
                Ok(value) => {
                    job.complete(value);
                    info!(target: "courier::queue", "Job {} completed", job.id);
                }
                Err(err) => {
                    job.fail(err.to_string());
                    warn!(target: "courier::queue", "Job {} failed: {}", job.id, err);
                }
            }
        }
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, payload: JobPayload, opts: JobOptions) -> QueueResult<Job> {
        let id = match &opts.job_id {
            Some(id) => id.clone(),
            None => format!("job-{}", self.inner.counter.fetch_add(1, Ordering::SeqCst) + 1),
        };

        let job = Job::new(id.clone(), payload, opts);
        {
            let mut jobs = self.inner.jobs.write().await;
            jobs.insert(id.clone(), job.clone());
        }

        debug!(
            target: "courier::queue",
            "Queue {}: job {} added for task {}",
            self.inner.name, job.id, job.task_id()
        );

        if self.inner.processor.read().await.is_some() {
            self.spawn_dispatch(id);
        }

        Ok(job)
    }

    async fn get_job(&self, id: &str) -> QueueResult<Option<Job>> {
        let jobs = self.inner.jobs.read().await;
        Ok(jobs.get(id).cloned())
    }

    async fn get_jobs(
        &self,
        states: &[JobState],
        start: usize,
        end: usize,
        ascending: bool,
    ) -> QueueResult<Vec<Job>> {
        let jobs = self.inner.jobs.read().await;
        let mut hits: Vec<Job> = jobs
            .values()
            .filter(|job| states.contains(&job.state))
            .cloned()
            .collect();

        hits.sort_by(|a, b| {
            if ascending {
                a.timestamp.cmp(&b.timestamp)
            } else {
                b.timestamp.cmp(&a.timestamp)
            }
        });

        let end = end.min(hits.len());
        let start = start.min(end);
        Ok(hits[start..end].to_vec())
    }

    async fn get_job_counts(&self) -> QueueResult<JobCounts> {
        let jobs = self.inner.jobs.read().await;
        let mut counts = JobCounts::default();
        for job in jobs.values() {
            match job.state {
                JobState::Waiting => counts.waiting += 1,
                JobState::Active => counts.active += 1,
                JobState::Completed => counts.completed += 1,
                JobState::Failed => counts.failed += 1,
                JobState::Delayed => counts.delayed += 1,
            }
        }
        Ok(counts)
    }

    async fn register_processor(
        &self,
        _concurrency: usize,
        handler: JobHandler,
    ) -> QueueResult<()> {
        {
            let mut processor = self.inner.processor.write().await;
            if processor.is_some() {
                return Err(QueueError::ProcessorAlreadyRegistered);
            }
            *processor = Some(handler);
        }

        info!(
            target: "courier::queue",
            "Queue {}: processor registered (serial processing)", self.inner.name
        );

        // Drain jobs that were enqueued before the processor existed
        let mut waiting: Vec<(chrono::DateTime<Utc>, String)> = {
            let jobs = self.inner.jobs.read().await;
            jobs.values()
                .filter(|job| job.state == JobState::Waiting)
                .map(|job| (job.timestamp, job.id.clone()))
                .collect()
        };
        waiting.sort();
        for (_, id) in waiting {
            self.spawn_dispatch(id);
        }

        Ok(())
    }

    async fn clean(
        &self,
        grace: Duration,
        state: JobState,
        limit: usize,
    ) -> QueueResult<Vec<Job>> {
        let cutoff = Utc::now() - chrono::Duration::milliseconds(grace.as_millis() as i64);

        let mut jobs = self.inner.jobs.write().await;
        let mut expired: Vec<Job> = jobs
            .values()
            .filter(|job| {
                job.state == state && job.finished_on.map(|at| at < cutoff).unwrap_or(false)
            })
            .cloned()
            .collect();
        expired.sort_by_key(|job| job.finished_on);
        expired.truncate(limit);

        for job in &expired {
            jobs.remove(&job.id);
        }

        if !expired.is_empty() {
            info!(
                target: "courier::queue",
                "Queue {}: cleaned {} {} jobs", self.inner.name, expired.len(), state
            );
        }

        Ok(expired)
    }

    async fn retry(&self, id: &str) -> QueueResult<Job> {
        let job = {
            let mut jobs = self.inner.jobs.write().await;
            let job = jobs
                .get_mut(id)
                .ok_or_else(|| QueueError::JobNotFound(id.to_string()))?;

            if job.state != JobState::Failed {
                return Err(QueueError::InvalidState {
                    id: id.to_string(),
                    state: job.state.to_string(),
                });
            }

            job.reset_for_retry();
            job.clone()
        };

        info!(target: "courier::queue", "Job {} scheduled for retry", id);

        if self.inner.processor.read().await.is_some() {
            self.spawn_dispatch(id.to_string());
        }

        Ok(job)
    }

    async fn remove(&self, id: &str) -> QueueResult<bool> {
        let mut jobs = self.inner.jobs.write().await;
        Ok(jobs.remove(id).is_some())
    }

    async fn close(&self) -> QueueResult<()> {
        debug!(target: "courier::queue", "Queue {}: closed", self.inner.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::job_handler;
    use uuid::Uuid;

    async fn settled(queue: &MemoryQueue, id: &str) -> Job {
        for _ in 0..200 {
            if let Some(job) = queue.get_job(id).await.unwrap()
                && job.state.is_terminal()
            {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {} did not reach a terminal state", id);
    }

    fn ok_handler() -> JobHandler {
        job_handler(|_job| async move { Ok(serde_json::json!({"success": true})) })
    }

    fn failing_handler(message: &'static str) -> JobHandler {
        job_handler(move |_job| async move {
            Err(QueueError::ExecutionFailed(message.to_string()))
        })
    }

    #[tokio::test]
    async fn test_enqueue_without_processor_stays_waiting() {
        let queue = MemoryQueue::new("test");
        let job = queue
            .enqueue(JobPayload::scheduled(Uuid::new_v4()), JobOptions::default())
            .await
            .unwrap();

        assert_eq!(job.state, JobState::Waiting);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let job = queue.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Waiting);
    }

    #[tokio::test]
    async fn test_processor_drains_waiting_jobs() {
        let queue = MemoryQueue::new("test");
        let job = queue
            .enqueue(JobPayload::scheduled(Uuid::new_v4()), JobOptions::default())
            .await
            .unwrap();

        queue.register_processor(1, ok_handler()).await.unwrap();

        let job = settled(&queue, &job.id).await;
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.attempts_made, 1);
        assert_eq!(job.return_value, Some(serde_json::json!({"success": true})));
    }

    #[tokio::test]
    async fn test_enqueue_processes_immediately_when_registered() {
        let queue = MemoryQueue::new("test");
        queue.register_processor(1, ok_handler()).await.unwrap();

        let job = queue
            .enqueue(JobPayload::manual(Uuid::new_v4()), JobOptions::default())
            .await
            .unwrap();

        let job = settled(&queue, &job.id).await;
        assert_eq!(job.state, JobState::Completed);
        assert!(job.finished_on.is_some());
    }

    #[tokio::test]
    async fn test_failed_job_parks_for_manual_retry() {
        let queue = MemoryQueue::new("test");
        queue
            .register_processor(1, failing_handler("boom"))
            .await
            .unwrap();

        let job = queue
            .enqueue(JobPayload::scheduled(Uuid::new_v4()), JobOptions::default())
            .await
            .unwrap();

        let job = settled(&queue, &job.id).await;
        assert_eq!(job.state, JobState::Failed);
        assert!(job.failed_reason.as_deref().unwrap().contains("boom"));

        // No automatic retry on the fallback
        tokio::time::sleep(Duration::from_millis(30)).await;
        let job = queue.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.attempts_made, 1);
    }

    #[tokio::test]
    async fn test_retry_requires_failed_state() {
        let queue = MemoryQueue::new("test");
        let job = queue
            .enqueue(JobPayload::scheduled(Uuid::new_v4()), JobOptions::default())
            .await
            .unwrap();

        let err = queue.retry(&job.id).await.unwrap_err();
        assert!(matches!(err, QueueError::InvalidState { .. }));

        let err = queue.retry("missing").await.unwrap_err();
        assert!(matches!(err, QueueError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn test_retry_reprocesses_failed_job() {
        let queue = MemoryQueue::new("test");
        queue
            .register_processor(1, failing_handler("boom"))
            .await
            .unwrap();

        let job = queue
            .enqueue(JobPayload::scheduled(Uuid::new_v4()), JobOptions::default())
            .await
            .unwrap();
        settled(&queue, &job.id).await;

        let retried = queue.retry(&job.id).await.unwrap();
        assert_eq!(retried.state, JobState::Waiting);
        assert_eq!(retried.attempts_made, 1);
        assert!(retried.finished_on.is_none());

        let job = settled(&queue, &job.id).await;
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.attempts_made, 2);
    }

    #[tokio::test]
    async fn test_get_jobs_filters_sorts_and_slices() {
        let queue = MemoryQueue::new("test");
        for _ in 0..5 {
            queue
                .enqueue(JobPayload::scheduled(Uuid::new_v4()), JobOptions::default())
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let jobs = queue
            .get_jobs(&[JobState::Waiting], 0, 3, true)
            .await
            .unwrap();
        assert_eq!(jobs.len(), 3);
        assert!(jobs[0].timestamp <= jobs[1].timestamp);

        let jobs = queue
            .get_jobs(&[JobState::Waiting], 0, 10, false)
            .await
            .unwrap();
        assert_eq!(jobs.len(), 5);
        assert!(jobs[0].timestamp >= jobs[4].timestamp);

        let none = queue
            .get_jobs(&[JobState::Completed, JobState::Failed], 0, 10, true)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_job_counts() {
        let queue = MemoryQueue::new("test");
        queue
            .enqueue(JobPayload::scheduled(Uuid::new_v4()), JobOptions::default())
            .await
            .unwrap();
        queue
            .enqueue(JobPayload::scheduled(Uuid::new_v4()), JobOptions::default())
            .await
            .unwrap();

        let counts = queue.get_job_counts().await.unwrap();
        assert_eq!(counts.waiting, 2);
        assert_eq!(counts.active, 0);
        assert_eq!(counts.delayed, 0);
        assert_eq!(counts.paused, 0);
        assert_eq!(counts.total(), 2);
    }

    #[tokio::test]
    async fn test_clean_removes_old_terminal_jobs() {
        let queue = MemoryQueue::new("test");
        queue.register_processor(1, ok_handler()).await.unwrap();

        let a = queue
            .enqueue(JobPayload::scheduled(Uuid::new_v4()), JobOptions::default())
            .await
            .unwrap();
        let b = queue
            .enqueue(JobPayload::scheduled(Uuid::new_v4()), JobOptions::default())
            .await
            .unwrap();
        settled(&queue, &a.id).await;
        settled(&queue, &b.id).await;

        // Everything finished before "now", so a zero grace removes both,
        // bounded by the limit.
        let removed = queue
            .clean(Duration::from_millis(0), JobState::Completed, 1)
            .await
            .unwrap();
        assert_eq!(removed.len(), 1);

        let counts = queue.get_job_counts().await.unwrap();
        assert_eq!(counts.completed, 1);

        // A long grace keeps the survivor
        let removed = queue
            .clean(Duration::from_secs(3600), JobState::Completed, 10)
            .await
            .unwrap();
        assert!(removed.is_empty());
    }

    #[tokio::test]
    async fn test_remove_job() {
        let queue = MemoryQueue::new("test");
        let job = queue
            .enqueue(JobPayload::scheduled(Uuid::new_v4()), JobOptions::default())
            .await
            .unwrap();

        assert!(queue.remove(&job.id).await.unwrap());
        assert!(!queue.remove(&job.id).await.unwrap());
        assert!(queue.get_job(&job.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_caller_assigned_job_id() {
        let queue = MemoryQueue::new("test");
        let opts = JobOptions {
            job_id: Some("custom-7".to_string()),
            ..JobOptions::default()
        };
        let job = queue
            .enqueue(JobPayload::manual(Uuid::new_v4()), opts)
            .await
            .unwrap();
        assert_eq!(job.id, "custom-7");
    }

    #[tokio::test]
    async fn test_register_processor_twice_fails() {
        let queue = MemoryQueue::new("test");
        queue.register_processor(1, ok_handler()).await.unwrap();
        let err = queue.register_processor(1, ok_handler()).await.unwrap_err();
        assert!(matches!(err, QueueError::ProcessorAlreadyRegistered));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let queue = MemoryQueue::new("test");
        queue.close().await.unwrap();
        queue.close().await.unwrap();
    }
}
