//! The periodic scheduler.
//!
//! Owns its timer: [`Scheduler::start`] spawns an interval loop that runs a
//! check immediately and then on every tick, [`Scheduler::stop`] flips the
//! running flag and aborts the loop. A failed tick is logged and skipped;
//! the next firing retries naturally.
//!
//! Each check scans `Created` tasks due in the window, snapshots the
//! active/waiting jobs once for de-duplication, applies recurrence,
//! future-date, and time-of-day gating, and enqueues one job per remaining
//! task.

use crate::error::{SchedulerError, SchedulerResult};
use crate::recurrence::is_due;
use chrono::{DateTime, Local, NaiveDate, Timelike};
use courier_core::{Pagination, StoreError, TaskFilter, TaskStatus, TaskStore};
use courier_log::{debug, error, info};
use courier_queue::{JobOptions, JobPayload, JobQueue, JobState};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between scheduled checks
    pub check_interval: Duration,
    /// Options applied to every job the scheduler enqueues
    pub job_options: JobOptions,
    /// Maximum tasks examined per check
    pub batch_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            job_options: JobOptions::default(),
            batch_limit: 100,
        }
    }
}

/// Options for a single check pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckOptions {
    /// Skip time-of-day gating for tasks due today
    pub ignore_time: bool,
    /// Extend the scan window past today (operational lookahead)
    pub end_date: Option<NaiveDate>,
    /// Enqueue every `Created` task regardless of schedule (debugging)
    pub check_all: bool,
}

/// A task the check enqueued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedTask {
    pub job_id: String,
    pub task_id: Uuid,
    pub name: String,
    pub date: NaiveDate,
    pub time: Option<String>,
}

/// A task the check saw but did not enqueue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRef {
    pub task_id: Uuid,
    pub name: String,
}

/// A task whose enqueue attempt failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskError {
    pub task_id: Uuid,
    pub name: String,
    pub error: String,
}

/// Outcome of one check pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckSummary {
    pub added: Vec<QueuedTask>,
    pub already_queued: Vec<TaskRef>,
    pub skipped_recurrent: Vec<TaskRef>,
    pub skipped_future_date: Vec<TaskRef>,
    pub skipped_for_time: Vec<TaskRef>,
    pub errors: Vec<TaskError>,
    pub message: String,
}

impl CheckSummary {
    /// Number of jobs enqueued by this pass.
    pub fn count(&self) -> usize {
        self.added.len()
    }

    fn finish(mut self) -> Self {
        self.message = format!(
            "Added {} tasks to the queue. \
             {} tasks skipped (scheduled for later today). \
             {} tasks skipped (scheduled for future dates). \
             {} tasks skipped (recurrence not due). \
             {} tasks were already queued.",
            self.added.len(),
            self.skipped_for_time.len(),
            self.skipped_future_date.len(),
            self.skipped_recurrent.len(),
            self.already_queued.len(),
        );
        self
    }
}

/// Receipt for a manual single-task trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessReceipt {
    pub job_id: String,
    pub task_id: Uuid,
    pub status: String,
    pub message: String,
}

struct Inner {
    queue: Arc<dyn JobQueue>,
    tasks: Arc<dyn TaskStore>,
    config: SchedulerConfig,
    running: RwLock<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// Timer-driven scheduler that feeds due tasks into the job queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        tasks: Arc<dyn TaskStore>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue,
                tasks,
                config,
                running: RwLock::new(false),
                handle: Mutex::new(None),
            }),
        }
    }

    /// Start the timer loop; the first check runs immediately.
    pub async fn start(&self) -> SchedulerResult<()> {
        {
            let mut running = self.inner.running.write().await;
            if *running {
                return Err(SchedulerError::AlreadyRunning);
            }
            *running = true;
        }

        info!(
            target: "courier::scheduler",
            "Scheduler started (check interval {:?})", self.inner.config.check_interval
        );

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.config.check_interval);
            loop {
                ticker.tick().await;
                if !*inner.running.read().await {
                    break;
                }
                match Inner::check(&inner, CheckOptions::default(), Local::now()).await {
                    Ok(summary) => {
                        debug!(target: "courier::scheduler", "{}", summary.message);
                    }
                    Err(e) => {
                        error!(
                            target: "courier::scheduler",
                            "Error checking pending tasks: {}", e
                        );
                    }
                }
            }
        });

        let mut slot = self.inner.handle.lock().await;
        *slot = Some(handle);
        Ok(())
    }

    /// Stop the timer loop.
    pub async fn stop(&self) -> SchedulerResult<()> {
        {
            let mut running = self.inner.running.write().await;
            if !*running {
                return Err(SchedulerError::NotRunning);
            }
            *running = false;
        }

        let mut slot = self.inner.handle.lock().await;
        if let Some(handle) = slot.take() {
            handle.abort();
        }

        info!(target: "courier::scheduler", "Scheduler stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        *self.inner.running.read().await
    }

    /// Run one check pass against the current clock.
    pub async fn check_pending_tasks(&self, options: CheckOptions) -> SchedulerResult<CheckSummary> {
        Inner::check(&self.inner, options, Local::now()).await
    }

    /// Run one check pass at an explicit instant (test seam).
    pub async fn check_pending_tasks_at(
        &self,
        options: CheckOptions,
        now: DateTime<Local>,
    ) -> SchedulerResult<CheckSummary> {
        Inner::check(&self.inner, options, now).await
    }

    /// Enqueue a single task immediately.
    ///
    /// Conflicts if the task is already represented by a waiting/active job
    /// or has already completed.
    pub async fn process_task(&self, task_id: Uuid) -> SchedulerResult<ProcessReceipt> {
        info!(
            target: "courier::scheduler",
            "Manual task processing requested for {}", task_id
        );

        let task = match self.inner.tasks.find_one(task_id).await {
            Ok(task) => task,
            Err(StoreError::NotFound(_)) => return Err(SchedulerError::TaskNotFound(task_id)),
            Err(e) => return Err(e.into()),
        };

        if task.status == TaskStatus::Completed {
            return Err(SchedulerError::TaskCompleted(task_id));
        }

        let existing = self
            .inner
            .queue
            .get_jobs(&[JobState::Active, JobState::Waiting], 0, usize::MAX, false)
            .await?;
        if existing.iter().any(|job| job.task_id() == task_id) {
            return Err(SchedulerError::AlreadyQueued(task_id));
        }

        let job = self
            .inner
            .queue
            .enqueue(
                JobPayload::manual(task_id),
                self.inner.config.job_options.clone(),
            )
            .await?;

        Ok(ProcessReceipt {
            message: format!(
                "Task {} ({}) queued for processing with job ID {}",
                task_id, task.name, job.id
            ),
            job_id: job.id,
            task_id,
            status: "queued".to_string(),
        })
    }
}

impl Inner {
    async fn check(
        inner: &Arc<Inner>,
        options: CheckOptions,
        now: DateTime<Local>,
    ) -> SchedulerResult<CheckSummary> {
        let today = now.date_naive();
        let end_date = options.end_date.unwrap_or(today);

        info!(
            target: "courier::scheduler",
            "Checking for pending tasks from {} to {} (time {:02}:{:02})",
            today, end_date, now.hour(), now.minute()
        );

        let filter = if options.check_all {
            TaskFilter::with_status(TaskStatus::Created)
        } else {
            TaskFilter::with_status(TaskStatus::Created).between(today, end_date)
        };

        let pending = inner
            .tasks
            .find(filter, Pagination::new(1, inner.config.batch_limit))
            .await?;

        let mut summary = CheckSummary::default();
        if pending.data.is_empty() {
            summary.message = "No pending tasks found".to_string();
            return Ok(summary);
        }

        // One snapshot up front: tasks in this pass cannot race each other
        // into duplicate jobs
        let existing = inner
            .queue
            .get_jobs(&[JobState::Active, JobState::Waiting], 0, usize::MAX, false)
            .await?;
        let queued_tasks: HashSet<Uuid> = existing.iter().map(|job| job.task_id()).collect();

        for task in pending.data {
            if queued_tasks.contains(&task.id) {
                debug!(
                    target: "courier::scheduler",
                    "Task {} already queued, skipping", task.id
                );
                summary.already_queued.push(TaskRef {
                    task_id: task.id,
                    name: task.name.clone(),
                });
                continue;
            }

            if !options.check_all {
                if task.is_recurrent() && !is_due(&task, today) {
                    debug!(
                        target: "courier::scheduler",
                        "Recurrent task {} not due today, skipping", task.id
                    );
                    summary.skipped_recurrent.push(TaskRef {
                        task_id: task.id,
                        name: task.name.clone(),
                    });
                    continue;
                }

                let is_today = task.notification_date == today;
                if is_today && !options.ignore_time
                    && let Some(scheduled) = &task.notification_time
                    && !time_reached(&now, scheduled)
                {
                    debug!(
                        target: "courier::scheduler",
                        "Task {} scheduled for later today ({}), skipping",
                        task.id, scheduled
                    );
                    summary.skipped_for_time.push(TaskRef {
                        task_id: task.id,
                        name: task.name.clone(),
                    });
                    continue;
                } else if !is_today {
                    debug!(
                        target: "courier::scheduler",
                        "Task {} scheduled for {}, skipping until then",
                        task.id, task.notification_date
                    );
                    summary.skipped_future_date.push(TaskRef {
                        task_id: task.id,
                        name: task.name.clone(),
                    });
                    continue;
                }
            }

            match inner
                .queue
                .enqueue(
                    JobPayload::scheduled(task.id),
                    inner.config.job_options.clone(),
                )
                .await
            {
                Ok(job) => {
                    info!(
                        target: "courier::scheduler",
                        "Added task {} to queue as job {}", task.id, job.id
                    );
                    summary.added.push(QueuedTask {
                        job_id: job.id,
                        task_id: task.id,
                        name: task.name.clone(),
                        date: task.notification_date,
                        time: task.notification_time.clone(),
                    });
                }
                Err(e) => {
                    // One bad task must not stop the rest of the batch
                    error!(
                        target: "courier::scheduler",
                        "Failed to enqueue task {}: {}", task.id, e
                    );
                    summary.errors.push(TaskError {
                        task_id: task.id,
                        name: task.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(summary.finish())
    }
}

/// Whether the wall clock has reached an "HH:MM" gate.
///
/// An unparseable gate never blocks delivery.
fn time_reached(now: &DateTime<Local>, scheduled: &str) -> bool {
    let Some((hour, minute)) = parse_hhmm(scheduled) else {
        return true;
    };
    now.hour() > hour || (now.hour() == hour && now.minute() >= minute)
}

fn parse_hhmm(value: &str) -> Option<(u32, u32)> {
    let (hour, minute) = value.trim().split_once(':')?;
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    if hour < 24 && minute < 60 {
        Some((hour, minute))
    } else {
        None
    }
}
