//! Durable queue backend on Redis.
//!
//! Key layout under the configured prefix: `job:{id}` holds the serialized
//! job; one sorted set per state (`waiting`, `active`, `completed`,
//! `failed`, `delayed`) holds job ids. `waiting` is scored by enqueue time
//! so claims pop the oldest job first, terminal sets by finish time so
//! clean-up and retention can range over age, and `delayed` by the instant
//! the job becomes ready again.

use crate::error::{QueueError, QueueResult};
use crate::job::{Job, JobCounts, JobHandler, JobOptions, JobPayload, JobState};
use crate::queue::JobQueue;
use async_trait::async_trait;
use chrono::Utc;
use courier_log::{debug, error, info, warn};
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Redis-backed [`JobQueue`] implementation with a bounded worker pool.
#[derive(Clone)]
pub struct RedisQueue {
    inner: Arc<Inner>,
}

struct Inner {
    connection: ConnectionManager,
    prefix: String,
    running: RwLock<bool>,
    registered: RwLock<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.prefix, suffix)
    }

    fn job_key(&self, id: &str) -> String {
        self.key(&format!("job:{}", id))
    }

    fn state_key(&self, state: JobState) -> String {
        self.key(state.as_str())
    }

    async fn save_job(&self, job: &Job) -> QueueResult<()> {
        let mut conn = self.connection.clone();
        let json =
            serde_json::to_string(job).map_err(|e| QueueError::Serialization(e.to_string()))?;
        let _: () = conn.set(self.job_key(&job.id), json).await?;
        Ok(())
    }

    async fn load_job(&self, id: &str) -> QueueResult<Option<Job>> {
        let mut conn = self.connection.clone();
        let json: Option<String> = conn.get(self.job_key(id)).await?;
        match json {
            Some(json) => {
                let job = serde_json::from_str(&json)
                    .map_err(|e| QueueError::Serialization(e.to_string()))?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// Move delayed jobs whose backoff has elapsed back to `waiting`.
    async fn promote_delayed(&self) -> QueueResult<()> {
        let mut conn = self.connection.clone();
        let delayed_key = self.state_key(JobState::Delayed);
        let now = Utc::now().timestamp_millis();

        let ids: Vec<String> = conn.zrangebyscore(&delayed_key, "-inf", now).await?;
        for id in ids {
            let _: () = conn.zrem(&delayed_key, &id).await?;
            if let Some(mut job) = self.load_job(&id).await? {
                job.state = JobState::Waiting;
                self.save_job(&job).await?;
                let waiting_key = self.state_key(JobState::Waiting);
                let _: () = conn
                    .zadd(&waiting_key, &id, job.timestamp.timestamp_millis())
                    .await?;
            }
        }

        Ok(())
    }

    /// Claim the oldest waiting job, marking it active.
    async fn claim_next(&self) -> QueueResult<Option<Job>> {
        self.promote_delayed().await?;

        let mut conn = self.connection.clone();
        let waiting_key = self.state_key(JobState::Waiting);

        let popped: Option<Vec<String>> = conn.zpopmin(&waiting_key, 1).await?;
        if let Some(items) = popped
            && let Some(id) = items.first()
            && let Some(mut job) = self.load_job(id).await?
        {
            job.start();
            self.save_job(&job).await?;

            let active_key = self.state_key(JobState::Active);
            let _: () = conn
                .zadd(&active_key, id, Utc::now().timestamp_millis())
                .await?;

            return Ok(Some(job));
        }

        Ok(None)
    }

    /// Settle a finished attempt: completed, delayed for retry, or failed.
    async fn finalize(&self, mut job: Job, result: QueueResult<serde_json::Value>) {
        if let Err(e) = self.try_finalize(&mut job, result).await {
            error!(
                target: "courier::queue",
                "Failed to record outcome of job {}: {}", job.id, e
            );
        }
    }

    async fn try_finalize(
        &self,
        job: &mut Job,
        result: QueueResult<serde_json::Value>,
    ) -> QueueResult<()> {
        let mut conn = self.connection.clone();
        let active_key = self.state_key(JobState::Active);
        let _: () = conn.zrem(&active_key, &job.id).await?;

        match result {
            Ok(value) => {
                job.complete(value);
                self.save_job(job).await?;

                let completed_key = self.state_key(JobState::Completed);
                let score = job
                    .finished_on
                    .unwrap_or_else(Utc::now)
                    .timestamp_millis();
                let _: () = conn.zadd(&completed_key, &job.id, score).await?;
                self.trim(JobState::Completed, job.opts.remove_on_complete)
                    .await?;

                info!(
                    target: "courier::queue",
                    "Job {} completed (attempt {})", job.id, job.attempts_made
                );
            }
            Err(err) if job.can_retry() => {
                let delay = job.opts.backoff.delay_for(job.attempts_made);
                job.delay(err.to_string());
                self.save_job(job).await?;

                let delayed_key = self.state_key(JobState::Delayed);
                let ready_at = Utc::now().timestamp_millis() + delay.as_millis() as i64;
                let _: () = conn.zadd(&delayed_key, &job.id, ready_at).await?;

                warn!(
                    target: "courier::queue",
                    "Job {} failed on attempt {} of {}, retrying in {:?}: {}",
                    job.id, job.attempts_made, job.opts.attempts, delay, err
                );
            }
            Err(err) => {
                job.fail(err.to_string());
                self.save_job(job).await?;

                let failed_key = self.state_key(JobState::Failed);
                let score = job
                    .finished_on
                    .unwrap_or_else(Utc::now)
                    .timestamp_millis();
                let _: () = conn.zadd(&failed_key, &job.id, score).await?;
                self.trim(JobState::Failed, job.opts.remove_on_fail).await?;

                error!(
                    target: "courier::queue",
                    "Job {} exhausted {} attempts: {}", job.id, job.attempts_made, err
                );
            }
        }

        Ok(())
    }

    /// Drop the oldest jobs beyond the retention count for a terminal state.
    async fn trim(&self, state: JobState, keep: usize) -> QueueResult<()> {
        let mut conn = self.connection.clone();
        let state_key = self.state_key(state);

        let count: usize = conn.zcard(&state_key).await?;
        if count <= keep {
            return Ok(());
        }

        let excess = (count - keep) as isize;
        let ids: Vec<String> = conn.zrange(&state_key, 0, excess - 1).await?;
        for id in &ids {
            let _: () = conn.del(self.job_key(id)).await?;
        }
        let _: () = conn.zremrangebyrank(&state_key, 0, excess - 1).await?;

        Ok(())
    }
}

impl RedisQueue {
    /// Connect to Redis and verify the connection with a `PING`.
    pub async fn connect(url: &str, prefix: impl Into<String>) -> QueueResult<Self> {
        let prefix = prefix.into();
        info!(target: "courier::queue", "Connecting Redis queue: {}", prefix);

        let client = Client::open(url).map_err(|e| QueueError::Config(e.to_string()))?;
        let mut connection = ConnectionManager::new(client).await?;
        let _: String = redis::cmd("PING").query_async(&mut connection).await?;

        info!(target: "courier::queue", "Redis queue '{}' ready", prefix);
        Ok(Self {
            inner: Arc::new(Inner {
                connection,
                prefix,
                running: RwLock::new(false),
                registered: RwLock::new(false),
                handles: Mutex::new(Vec::new()),
            }),
        })
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn enqueue(&self, payload: JobPayload, opts: JobOptions) -> QueueResult<Job> {
        let id = match &opts.job_id {
            Some(id) => id.clone(),
            None => uuid::Uuid::new_v4().to_string(),
        };

        let job = Job::new(id.clone(), payload, opts);
        self.inner.save_job(&job).await?;

        let mut conn = self.inner.connection.clone();
        let waiting_key = self.inner.state_key(JobState::Waiting);
        let _: () = conn
            .zadd(&waiting_key, &id, job.timestamp.timestamp_millis())
            .await?;

        debug!(
            target: "courier::queue",
            "Queue {}: job {} added for task {}",
            self.inner.prefix, job.id, job.task_id()
        );

        Ok(job)
    }

    async fn get_job(&self, id: &str) -> QueueResult<Option<Job>> {
        self.inner.load_job(id).await
    }

    async fn get_jobs(
        &self,
        states: &[JobState],
        start: usize,
        end: usize,
        ascending: bool,
    ) -> QueueResult<Vec<Job>> {
        let mut conn = self.inner.connection.clone();
        let mut hits: Vec<Job> = Vec::new();

        for state in states {
            let state_key = self.inner.state_key(*state);
            let ids: Vec<String> = conn.zrange(&state_key, 0, -1).await?;
            for id in ids {
                if let Some(job) = self.inner.load_job(&id).await? {
                    hits.push(job);
                }
            }
        }

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
        let mut conn = self.inner.connection.clone();
        let mut counts = JobCounts::default();

        for state in JobState::ALL {
            let count: usize = conn.zcard(self.inner.state_key(state)).await?;
            match state {
                JobState::Waiting => counts.waiting = count,
                JobState::Active => counts.active = count,
                JobState::Completed => counts.completed = count,
                JobState::Failed => counts.failed = count,
                JobState::Delayed => counts.delayed = count,
            }
        }

        Ok(counts)
    }

    async fn register_processor(
        &self,
        concurrency: usize,
        handler: JobHandler,
    ) -> QueueResult<()> {
        {
            let mut registered = self.inner.registered.write().await;
            if *registered {
                return Err(QueueError::ProcessorAlreadyRegistered);
            }
            *registered = true;
        }
        {
            let mut running = self.inner.running.write().await;
            *running = true;
        }

        info!(
            target: "courier::queue",
            "Queue {}: starting worker pool with concurrency {}",
            self.inner.prefix, concurrency
        );

        let mut handles = self.inner.handles.lock().await;
        for worker in 0..concurrency.max(1) {
            let inner = self.inner.clone();
            let handler = handler.clone();

            let handle = tokio::spawn(async move {
                while *inner.running.read().await {
                    match inner.claim_next().await {
                        Ok(Some(job)) => {
                            debug!(
                                target: "courier::queue",
                                "Worker {}: processing job {} (attempt {})",
                                worker, job.id, job.attempts_made
                            );
                            let result = handler(job.clone()).await;
                            inner.finalize(job, result).await;
                        }
                        Ok(None) => {
                            tokio::time::sleep(POLL_INTERVAL).await;
                        }
                        Err(e) => {
                            error!(
                                target: "courier::queue",
                                "Worker {}: error claiming job: {}", worker, e
                            );
                            tokio::time::sleep(POLL_INTERVAL).await;
                        }
                    }
                }

                debug!(target: "courier::queue", "Worker {} stopped", worker);
            });

            handles.push(handle);
        }

        Ok(())
    }

    async fn clean(
        &self,
        grace: Duration,
        state: JobState,
        limit: usize,
    ) -> QueueResult<Vec<Job>> {
        // Only terminal jobs carry a finish time to age against
        if !state.is_terminal() {
            return Ok(Vec::new());
        }

        let mut conn = self.inner.connection.clone();
        let state_key = self.inner.state_key(state);
        let cutoff = Utc::now().timestamp_millis() - grace.as_millis() as i64;

        let ids: Vec<String> = conn
            .zrangebyscore_limit(&state_key, "-inf", cutoff, 0, limit as isize)
            .await?;

        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(job) = self.inner.load_job(&id).await? {
                removed.push(job);
            }
            let _: () = conn.zrem(&state_key, &id).await?;
            let _: () = conn.del(self.inner.job_key(&id)).await?;
        }

        if !removed.is_empty() {
            info!(
                target: "courier::queue",
                "Queue {}: cleaned {} {} jobs", self.inner.prefix, removed.len(), state
            );
        }

        Ok(removed)
    }

    async fn retry(&self, id: &str) -> QueueResult<Job> {
        let mut job = self
            .inner
            .load_job(id)
            .await?
            .ok_or_else(|| QueueError::JobNotFound(id.to_string()))?;

        if job.state != JobState::Failed {
            return Err(QueueError::InvalidState {
                id: id.to_string(),
                state: job.state.to_string(),
            });
        }

        let mut conn = self.inner.connection.clone();
        let failed_key = self.inner.state_key(JobState::Failed);
        let _: () = conn.zrem(&failed_key, id).await?;

        job.reset_for_retry();
        self.inner.save_job(&job).await?;

        let waiting_key = self.inner.state_key(JobState::Waiting);
        let _: () = conn
            .zadd(&waiting_key, id, job.timestamp.timestamp_millis())
            .await?;

        info!(target: "courier::queue", "Job {} scheduled for retry", id);
        Ok(job)
    }

    async fn remove(&self, id: &str) -> QueueResult<bool> {
        let Some(job) = self.inner.load_job(id).await? else {
            return Ok(false);
        };

        let mut conn = self.inner.connection.clone();
        let state_key = self.inner.state_key(job.state);
        let _: () = conn.zrem(&state_key, id).await?;
        let _: () = conn.del(self.inner.job_key(id)).await?;

        Ok(true)
    }

    async fn close(&self) -> QueueResult<()> {
        {
            let mut running = self.inner.running.write().await;
            if !*running {
                return Ok(());
            }
            *running = false;
        }

        let mut handles = self.inner.handles.lock().await;
        for handle in handles.drain(..) {
            handle.abort();
        }

        info!(target: "courier::queue", "Queue {}: closed", self.inner.prefix);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::job_handler;
    use uuid::Uuid;

    // Connected tests require a local Redis and run with: cargo test -- --ignored

    #[tokio::test]
    #[ignore]
    async fn test_enqueue_and_claim_round_trip() {
        let queue = RedisQueue::connect("redis://localhost:6379/0", "courier-test")
            .await
            .unwrap();

        let job = queue
            .enqueue(JobPayload::scheduled(Uuid::new_v4()), JobOptions::default())
            .await
            .unwrap();
        assert_eq!(job.state, JobState::Waiting);

        queue
            .register_processor(
                1,
                job_handler(|_job| async move { Ok(serde_json::json!({"success": true})) }),
            )
            .await
            .unwrap();

        for _ in 0..50 {
            if let Some(found) = queue.get_job(&job.id).await.unwrap()
                && found.state == JobState::Completed
            {
                queue.close().await.unwrap();
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("job never completed");
    }

    #[tokio::test]
    async fn test_connect_failure_is_backend_error() {
        // Nothing listens on this port; connection establishment must fail
        let result = RedisQueue::connect("redis://127.0.0.1:1/0", "courier-test").await;
        assert!(result.is_err());
    }
}
