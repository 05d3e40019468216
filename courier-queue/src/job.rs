//! Job definition and state management.

use crate::error::QueueResult;
use chrono::{DateTime, Utc};
use courier_config::{Backoff, JobSettings};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

/// Job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Waiting to be claimed by a worker
    Waiting,
    /// Claimed and currently processing
    Active,
    /// Finished successfully
    Completed,
    /// Finished with an error; eligible for manual retry
    Failed,
    /// Parked until a backoff delay elapses (durable backend only)
    Delayed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Delayed => "delayed",
        }
    }

    /// Parse a state name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "waiting" => Some(JobState::Waiting),
            "active" => Some(JobState::Active),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            "delayed" => Some(JobState::Delayed),
            _ => None,
        }
    }

    /// Whether the state is terminal (`Completed` or `Failed`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// All states, in display order.
    pub const ALL: [JobState; 5] = [
        JobState::Waiting,
        JobState::Active,
        JobState::Completed,
        JobState::Failed,
        JobState::Delayed,
    ];
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What caused a job to be enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobTrigger {
    /// Enqueued by a scheduler pass
    Scheduled,
    /// Enqueued by an explicit operator request
    Manual,
}

/// Payload carried by every notification job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    /// The task this job delivers notifications for
    pub task_id: Uuid,
    pub trigger: JobTrigger,
    /// When the job was requested
    pub timestamp: DateTime<Utc>,
}

impl JobPayload {
    /// Payload for a scheduler-enqueued job.
    pub fn scheduled(task_id: Uuid) -> Self {
        Self {
            task_id,
            trigger: JobTrigger::Scheduled,
            timestamp: Utc::now(),
        }
    }

    /// Payload for a manually triggered job.
    pub fn manual(task_id: Uuid) -> Self {
        Self {
            task_id,
            trigger: JobTrigger::Manual,
            timestamp: Utc::now(),
        }
    }
}

/// Per-job options, fixed at enqueue time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    /// Maximum processing attempts before the job parks in `Failed`
    pub attempts: u32,
    /// Retry backoff policy (durable backend)
    pub backoff: Backoff,
    /// Completed-set retention (durable backend)
    pub remove_on_complete: usize,
    /// Failed-set retention (durable backend)
    pub remove_on_fail: usize,
    /// Caller-assigned job id; queue-assigned when absent
    pub job_id: Option<String>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Backoff::Fixed { delay_ms: 5_000 },
            remove_on_complete: 100,
            remove_on_fail: 100,
            job_id: None,
        }
    }
}

impl From<&JobSettings> for JobOptions {
    fn from(settings: &JobSettings) -> Self {
        Self {
            attempts: settings.attempts,
            backoff: settings.backoff,
            remove_on_complete: settings.remove_on_complete,
            remove_on_fail: settings.remove_on_fail,
            job_id: None,
        }
    }
}

/// A queued unit of execution, owned by the queue for its whole lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Queue-assigned (or caller-assigned) identifier
    pub id: String,
    pub payload: JobPayload,
    pub opts: JobOptions,
    pub state: JobState,
    /// Number of processing attempts started so far
    pub attempts_made: u32,
    /// Enqueue time
    pub timestamp: DateTime<Utc>,
    /// Set exactly once when the job reaches a terminal state
    pub finished_on: Option<DateTime<Utc>>,
    /// Handler result on success
    pub return_value: Option<serde_json::Value>,
    /// Handler error on failure
    pub failed_reason: Option<String>,
}

impl Job {
    /// Create a job in the `Waiting` state.
    pub fn new(id: impl Into<String>, payload: JobPayload, opts: JobOptions) -> Self {
        Self {
            id: id.into(),
            payload,
            opts,
            state: JobState::Waiting,
            attempts_made: 0,
            timestamp: Utc::now(),
            finished_on: None,
            return_value: None,
            failed_reason: None,
        }
    }

    /// The task this job belongs to.
    pub fn task_id(&self) -> Uuid {
        self.payload.task_id
    }

    /// Whether another attempt is allowed after a failure.
    pub fn can_retry(&self) -> bool {
        self.attempts_made < self.opts.attempts
    }

    /// Begin a processing attempt.
    pub(crate) fn start(&mut self) {
        self.state = JobState::Active;
        self.attempts_made += 1;
    }

    /// Finish successfully.
    pub(crate) fn complete(&mut self, value: serde_json::Value) {
        self.state = JobState::Completed;
        self.return_value = Some(value);
        self.finished_on = Some(Utc::now());
    }

    /// Finish with an error.
    pub(crate) fn fail(&mut self, reason: impl Into<String>) {
        self.state = JobState::Failed;
        self.failed_reason = Some(reason.into());
        self.finished_on = Some(Utc::now());
    }

    /// Park for a backoff retry (durable backend).
    pub(crate) fn delay(&mut self, reason: impl Into<String>) {
        self.state = JobState::Delayed;
        self.failed_reason = Some(reason.into());
    }

    /// Reset a failed job back to `Waiting` for a manual retry.
    ///
    /// `attempts_made` is preserved; `finished_on` and `return_value` are
    /// cleared. The last failure reason stays on the job as history.
    pub(crate) fn reset_for_retry(&mut self) {
        self.state = JobState::Waiting;
        self.finished_on = None;
        self.return_value = None;
    }
}

/// Counts of jobs per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub waiting: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub delayed: usize,
    pub paused: usize,
}

impl JobCounts {
    pub fn total(&self) -> usize {
        self.waiting + self.active + self.completed + self.failed + self.delayed + self.paused
    }
}

/// Handler invoked once per claimed job; the returned value becomes the
/// job's `return_value`.
pub type JobHandler = Arc<
    dyn Fn(Job) -> Pin<Box<dyn Future<Output = QueueResult<serde_json::Value>> + Send>>
        + Send
        + Sync,
>;

/// Wrap an async closure into a [`JobHandler`].
pub fn job_handler<F, Fut>(handler: F) -> JobHandler
where
    F: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = QueueResult<serde_json::Value>> + Send + 'static,
{
    Arc::new(move |job: Job| Box::pin(handler(job)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> Job {
        Job::new(
            "job-1",
            JobPayload::scheduled(Uuid::new_v4()),
            JobOptions::default(),
        )
    }

    #[test]
    fn test_job_starts_waiting() {
        let job = sample_job();
        assert_eq!(job.state, JobState::Waiting);
        assert_eq!(job.attempts_made, 0);
        assert!(job.finished_on.is_none());
    }

    #[test]
    fn test_job_lifecycle_success() {
        let mut job = sample_job();
        job.start();
        assert_eq!(job.state, JobState::Active);
        assert_eq!(job.attempts_made, 1);

        job.complete(serde_json::json!({"success": true}));
        assert_eq!(job.state, JobState::Completed);
        assert!(job.finished_on.is_some());
        assert!(job.return_value.is_some());
    }

    #[test]
    fn test_job_lifecycle_failure() {
        let mut job = sample_job();
        job.start();
        job.fail("boom");
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.failed_reason.as_deref(), Some("boom"));
        assert!(job.finished_on.is_some());
    }

    #[test]
    fn test_reset_for_retry_preserves_attempts() {
        let mut job = sample_job();
        job.start();
        job.fail("boom");

        job.reset_for_retry();
        assert_eq!(job.state, JobState::Waiting);
        assert_eq!(job.attempts_made, 1);
        assert!(job.finished_on.is_none());
        assert!(job.return_value.is_none());
        assert_eq!(job.failed_reason.as_deref(), Some("boom"));
    }

    #[test]
    fn test_can_retry_respects_attempt_budget() {
        let mut job = sample_job();
        job.opts.attempts = 2;

        job.start();
        assert!(job.can_retry());
        job.start();
        assert!(!job.can_retry());
    }

    #[test]
    fn test_state_parse() {
        assert_eq!(JobState::parse("waiting"), Some(JobState::Waiting));
        assert_eq!(JobState::parse("ACTIVE"), Some(JobState::Active));
        assert_eq!(JobState::parse(" failed "), Some(JobState::Failed));
        assert_eq!(JobState::parse("paused"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Waiting.is_terminal());
        assert!(!JobState::Active.is_terminal());
        assert!(!JobState::Delayed.is_terminal());
    }

    #[test]
    fn test_payload_triggers() {
        let task_id = Uuid::new_v4();
        assert_eq!(JobPayload::scheduled(task_id).trigger, JobTrigger::Scheduled);
        assert_eq!(JobPayload::manual(task_id).trigger, JobTrigger::Manual);
    }

    #[test]
    fn test_options_from_settings() {
        let settings = JobSettings {
            attempts: 8,
            remove_on_complete: 500,
            remove_on_fail: 500,
            backoff: Backoff::Exponential { delay_ms: 10_000 },
        };
        let opts = JobOptions::from(&settings);
        assert_eq!(opts.attempts, 8);
        assert_eq!(opts.remove_on_complete, 500);
        assert!(opts.job_id.is_none());
    }

    #[test]
    fn test_job_serde_round_trip() {
        let mut job = sample_job();
        job.start();
        job.complete(serde_json::json!({"ok": true}));

        let json = serde_json::to_string(&job).unwrap();
        let back: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, job.id);
        assert_eq!(back.state, JobState::Completed);
        assert_eq!(back.attempts_made, 1);
        assert_eq!(back.payload.task_id, job.payload.task_id);
    }
}
