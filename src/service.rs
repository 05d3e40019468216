//! The notification service facade.
//!
//! Wires the queue backend, the job processor, and the scheduler together
//! and exposes the operational surface the API layer calls: manual checks,
//! single-task triggers, job listing and inspection, retry/remove/clean,
//! and queue status. The HTTP contract itself lives outside this crate.

use crate::error::{ServiceError, ServiceResult};
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate, Utc};
use courier_config::QueueSettings;
use courier_core::{
    LogStats, NotificationLogStore, NotificationType, Page, PageInfo, Pagination,
    RecipientResolver, TaskFilter, TaskStatus, TaskStore, TemplateStore,
};
use courier_log::{info, warn};
use courier_notify::{NotificationDispatcher, NotificationProcessor};
use courier_queue::{
    Job, JobCounts, JobOptions, JobQueue, JobState, MemoryQueue, QueueError, RedisQueue,
};
use courier_scheduler::{CheckOptions, CheckSummary, ProcessReceipt, Scheduler, SchedulerConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// The store collaborators the service is wired against.
#[derive(Clone)]
pub struct ServiceStores {
    pub tasks: Arc<dyn TaskStore>,
    pub templates: Arc<dyn TemplateStore>,
    pub recipients: Arc<dyn RecipientResolver>,
    pub logs: Arc<dyn NotificationLogStore>,
}

/// API-shaped view of a queued job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    pub id: String,
    pub state: JobState,
    pub task_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub attempts: u32,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub finished_on: Option<DateTime<Utc>>,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        Self {
            task_id: job.task_id(),
            id: job.id,
            state: job.state,
            timestamp: job.timestamp,
            attempts: job.attempts_made,
            result: job.return_value,
            error: job.failed_reason,
            finished_on: job.finished_on,
        }
    }
}

/// Sort key for job listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobSortKey {
    #[default]
    Timestamp,
    Attempts,
}

/// Query for [`NotificationService::list_jobs`].
#[derive(Debug, Clone)]
pub struct JobQuery {
    /// Union of states to include; empty means all states
    pub states: Vec<JobState>,
    /// Restrict to jobs for one task
    pub task_id: Option<Uuid>,
    pub sort_by: JobSortKey,
    pub ascending: bool,
    pub pagination: Pagination,
}

impl Default for JobQuery {
    fn default() -> Self {
        Self {
            states: Vec::new(),
            task_id: None,
            sort_by: JobSortKey::Timestamp,
            ascending: false,
            pagination: Pagination::new(1, 20),
        }
    }
}

/// Coarse queue health derived from the job counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceHealth {
    /// Nothing active, nothing failing
    Operational,
    /// Jobs currently processing
    Working,
    /// Failed jobs present and nothing active working them off
    AttentionNeeded,
}

/// A task due in the upcoming window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpcomingTask {
    pub id: Uuid,
    pub name: String,
    pub notification_date: NaiveDate,
    pub notification_time: Option<String>,
    pub status: TaskStatus,
    pub notification_type: NotificationType,
}

/// Queue status snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    pub status: ServiceHealth,
    pub jobs: JobCounts,
    pub workers: usize,
    pub upcoming: Vec<UpcomingTask>,
}

/// The assembled notification pipeline.
pub struct NotificationService {
    queue: Arc<dyn JobQueue>,
    scheduler: Scheduler,
    tasks: Arc<dyn TaskStore>,
    logs: Arc<dyn NotificationLogStore>,
    settings: QueueSettings,
}

impl NotificationService {
    /// Select the queue backend, wire the processor, and build the
    /// scheduler. Call [`NotificationService::start`] to begin scheduled
    /// checks.
    pub async fn initialize(
        settings: QueueSettings,
        stores: ServiceStores,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> ServiceResult<Self> {
        courier_log::init();
        info!(target: "courier::service", "Initializing notification queue service");

        let queue = Self::select_queue(&settings).await;

        let processor = Arc::new(NotificationProcessor::new(
            stores.tasks.clone(),
            stores.templates.clone(),
            stores.recipients.clone(),
            stores.logs.clone(),
            dispatcher,
        ));
        queue
            .register_processor(settings.concurrency, processor.handler())
            .await?;

        let scheduler = Scheduler::new(
            queue.clone(),
            stores.tasks.clone(),
            SchedulerConfig {
                check_interval: settings.check_interval,
                job_options: JobOptions::from(&settings.job),
                batch_limit: 100,
            },
        );

        info!(target: "courier::service", "Notification queue service initialized");
        Ok(Self {
            queue,
            scheduler,
            tasks: stores.tasks,
            logs: stores.logs,
            settings,
        })
    }

    /// Durable backend when enabled and reachable; otherwise the in-memory
    /// fallback. A connection failure degrades with a warning instead of
    /// failing startup.
    async fn select_queue(settings: &QueueSettings) -> Arc<dyn JobQueue> {
        let name = format!("{}:queue", settings.prefix);

        if !settings.enabled {
            info!(
                target: "courier::service",
                "Durable queue disabled, using in-memory queue"
            );
            return Arc::new(MemoryQueue::new(name));
        }

        match RedisQueue::connect(&settings.redis.url(), &name).await {
            Ok(queue) => {
                info!(
                    target: "courier::service",
                    "Durable queue connected at {}:{}", settings.redis.host, settings.redis.port
                );
                Arc::new(queue)
            }
            Err(e) => {
                warn!(
                    target: "courier::service",
                    "Falling back to in-memory queue, broker unreachable: {}", e
                );
                Arc::new(MemoryQueue::new(name))
            }
        }
    }

    /// Start scheduled checks.
    pub async fn start(&self) -> ServiceResult<()> {
        self.scheduler.start().await?;
        Ok(())
    }

    /// Stop the scheduler and close the queue. Idempotent.
    pub async fn shutdown(&self) -> ServiceResult<()> {
        info!(target: "courier::service", "Shutting down notification queue service");
        if self.scheduler.is_running().await {
            self.scheduler.stop().await?;
        }
        self.queue.close().await?;
        Ok(())
    }

    /// The queue this service runs on.
    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    /// The scheduler driving this service.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Trigger a check pass for due tasks.
    pub async fn check_pending_tasks(
        &self,
        options: CheckOptions,
    ) -> ServiceResult<CheckSummary> {
        Ok(self.scheduler.check_pending_tasks(options).await?)
    }

    /// Enqueue a single task immediately; conflicts if already queued or
    /// completed.
    pub async fn process_task(&self, task_id: Uuid) -> ServiceResult<ProcessReceipt> {
        Ok(self.scheduler.process_task(task_id).await?)
    }

    /// Fetch one job.
    pub async fn get_job(&self, id: &str) -> ServiceResult<Option<JobView>> {
        Ok(self.queue.get_job(id).await?.map(JobView::from))
    }

    /// List jobs with state/task filtering, sorting, and pagination.
    pub async fn list_jobs(&self, query: JobQuery) -> ServiceResult<Page<JobView>> {
        let states = if query.states.is_empty() {
            JobState::ALL.to_vec()
        } else {
            query.states.clone()
        };

        let mut jobs = self.queue.get_jobs(&states, 0, usize::MAX, false).await?;

        if let Some(task_id) = query.task_id {
            jobs.retain(|job| job.task_id() == task_id);
        }

        match query.sort_by {
            JobSortKey::Timestamp => jobs.sort_by(|a, b| {
                if query.ascending {
                    a.timestamp.cmp(&b.timestamp)
                } else {
                    b.timestamp.cmp(&a.timestamp)
                }
            }),
            JobSortKey::Attempts => jobs.sort_by(|a, b| {
                if query.ascending {
                    a.attempts_made.cmp(&b.attempts_made)
                } else {
                    b.attempts_made.cmp(&a.attempts_made)
                }
            }),
        }

        let total = jobs.len();
        let data: Vec<JobView> = jobs
            .into_iter()
            .skip(query.pagination.offset())
            .take(query.pagination.limit)
            .map(JobView::from)
            .collect();

        Ok(Page {
            data,
            pagination: PageInfo::new(query.pagination, total),
        })
    }

    /// Per-state job counts.
    pub async fn get_job_counts(&self) -> ServiceResult<JobCounts> {
        Ok(self.queue.get_job_counts().await?)
    }

    /// Retry a failed job.
    pub async fn retry_job(&self, id: &str) -> ServiceResult<JobView> {
        match self.queue.retry(id).await {
            Ok(job) => Ok(JobView::from(job)),
            Err(QueueError::JobNotFound(id)) => Err(ServiceError::JobNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a job in any state.
    pub async fn remove_job(&self, id: &str) -> ServiceResult<()> {
        if self.queue.remove(id).await? {
            info!(target: "courier::service", "Job {} removed", id);
            Ok(())
        } else {
            Err(ServiceError::JobNotFound(id.to_string()))
        }
    }

    /// Remove terminal jobs older than the grace period, bounded by limit.
    pub async fn clean_jobs(
        &self,
        grace: Duration,
        state: JobState,
        limit: usize,
    ) -> ServiceResult<Vec<JobView>> {
        let removed = self.queue.clean(grace, state, limit).await?;
        Ok(removed.into_iter().map(JobView::from).collect())
    }

    /// Queue health, counts, and the tasks due in the next `upcoming_days`.
    pub async fn queue_status(&self, upcoming_days: u32) -> ServiceResult<QueueStatus> {
        let jobs = self.queue.get_job_counts().await?;

        let status = if jobs.active > 0 {
            ServiceHealth::Working
        } else if jobs.failed > 0 {
            ServiceHealth::AttentionNeeded
        } else {
            ServiceHealth::Operational
        };

        let today = Local::now().date_naive();
        let window_end = today + ChronoDuration::days(upcoming_days as i64);
        let page = self
            .tasks
            .find(
                TaskFilter::default().between(today, window_end),
                Pagination::new(1, 100),
            )
            .await?;

        let mut upcoming: Vec<UpcomingTask> = page
            .data
            .into_iter()
            .map(|task| UpcomingTask {
                id: task.id,
                name: task.name,
                notification_date: task.notification_date,
                notification_time: task.notification_time,
                status: task.status,
                notification_type: task.notification_type,
            })
            .collect();
        upcoming.sort_by(|a, b| {
            (a.notification_date, a.notification_time.as_deref())
                .cmp(&(b.notification_date, b.notification_time.as_deref()))
        });

        Ok(QueueStatus {
            status,
            jobs,
            workers: self.settings.concurrency,
            upcoming,
        })
    }

    /// Aggregate delivery counters from the notification log.
    pub async fn notification_stats(&self) -> ServiceResult<LogStats> {
        Ok(self.logs.stats().await?)
    }
}
