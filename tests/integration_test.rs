//! End-to-end tests for the assembled notification pipeline: in-memory
//! queue and stores, recording dispatcher, explicit clock where gating
//! matters.

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate, TimeZone};
use courier::prelude::*;
use courier_core::memory::{
    MemoryNotificationLogStore, MemoryRecipientDirectory, MemoryTaskStore, MemoryTemplateStore,
};
use courier_core::{NotificationLogStore, TaskStore};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

struct Harness {
    service: NotificationService,
    tasks: MemoryTaskStore,
    logs: MemoryNotificationLogStore,
    recipients: MemoryRecipientDirectory,
    dispatcher: RecordingDispatcher,
}

async fn harness_with(settings: QueueSettings) -> Harness {
    let tasks = MemoryTaskStore::new();
    let templates = MemoryTemplateStore::new();
    let recipients = MemoryRecipientDirectory::new();
    let logs = MemoryNotificationLogStore::new();
    let dispatcher = RecordingDispatcher::new();

    let service = NotificationService::initialize(
        settings,
        ServiceStores {
            tasks: Arc::new(tasks.clone()),
            templates: Arc::new(templates.clone()),
            recipients: Arc::new(recipients.clone()),
            logs: Arc::new(logs.clone()),
        },
        Arc::new(dispatcher.clone()),
    )
    .await
    .expect("service initialization");

    Harness {
        service,
        tasks,
        logs,
        recipients,
        dispatcher,
    }
}

async fn harness() -> Harness {
    harness_with(QueueSettings::for_environment(Environment::Test)).await
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Local> {
    Local
        .from_local_datetime(&date.and_hms_opt(hour, minute, 0).unwrap())
        .single()
        .expect("unambiguous local time")
}

async fn seed_recipient(harness: &Harness, id: &str) {
    harness
        .recipients
        .add(Recipient::new(
            id,
            format!("{}@example.com", id),
            format!("User {}", id),
        ))
        .await;
}

async fn settled_task(harness: &Harness, task_id: Uuid) -> Task {
    for _ in 0..200 {
        let task = harness.tasks.find_one(task_id).await.unwrap();
        if matches!(task.status, TaskStatus::Completed | TaskStatus::Failed) {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("task {} never reached a terminal status", task_id);
}

#[tokio::test]
async fn test_end_to_end_scheduled_delivery() {
    let harness = harness().await;
    seed_recipient(&harness, "u1").await;

    let task = harness
        .tasks
        .insert(
            Task::new("morning digest", today(), NotificationType::Task, "u1")
                .with_time("09:00")
                .with_description("send the digest"),
        )
        .await;

    // Checked five minutes after the gate with time gating active
    let summary = harness
        .service
        .scheduler()
        .check_pending_tasks_at(CheckOptions::default(), at(today(), 9, 5))
        .await
        .unwrap();
    assert_eq!(summary.count(), 1);

    let job_id = summary.added[0].job_id.clone();
    let job = harness.service.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.task_id, task.id);

    let task = settled_task(&harness, task.id).await;
    assert_eq!(task.status, TaskStatus::Completed);

    let rows = harness.logs.find_by_task(task.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, DeliveryStatus::Success);

    let sent = harness.dispatcher.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient_email, "u1@example.com");

    let job = harness.service.get_job(&job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
}

#[tokio::test]
async fn test_check_all_enqueues_unrelated_future_dates() {
    let harness = harness().await;
    seed_recipient(&harness, "u1").await;

    let mut ids = Vec::new();
    for i in 0..5 {
        let task = harness
            .tasks
            .insert(Task::new(
                format!("someday {}", i),
                today() + ChronoDuration::days(60 + i),
                NotificationType::Task,
                "u1",
            ))
            .await;
        ids.push(task.id);
    }

    let summary = harness
        .service
        .check_pending_tasks(CheckOptions {
            check_all: true,
            ..CheckOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(summary.count(), 5);

    for id in ids {
        settled_task(&harness, id).await;
    }
    assert_eq!(harness.dispatcher.sent_count().await, 5);
}

#[tokio::test]
async fn test_unreachable_broker_falls_back_to_memory_queue() {
    let mut settings = QueueSettings::for_environment(Environment::Test);
    settings.enabled = true;
    settings.redis.host = "127.0.0.1".to_string();
    settings.redis.port = 1; // nothing listens here

    let harness = harness_with(settings).await;
    seed_recipient(&harness, "u1").await;

    // The service came up anyway and processes jobs in memory
    let task = harness
        .tasks
        .insert(Task::new("degraded", today(), NotificationType::Task, "u1"))
        .await;
    harness.service.process_task(task.id).await.unwrap();

    let task = settled_task(&harness, task.id).await;
    assert_eq!(task.status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_retry_flow_through_the_service() {
    let harness = harness().await;
    seed_recipient(&harness, "u1").await;
    harness.dispatcher.fail_for("u1@example.com").await;

    let task = harness
        .tasks
        .insert(Task::new("flaky", today(), NotificationType::Task, "u1"))
        .await;

    let receipt = harness.service.process_task(task.id).await.unwrap();
    settled_task(&harness, task.id).await;

    let job = harness
        .service
        .get_job(&receipt.job_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.attempts, 1);

    let retried = harness.service.retry_job(&receipt.job_id).await.unwrap();
    assert_eq!(retried.state, JobState::Waiting);
    assert_eq!(retried.attempts, 1);
    assert!(retried.finished_on.is_none());

    // Second attempt fails again and each attempt leaves its own log row
    for _ in 0..200 {
        let job = harness
            .service
            .get_job(&receipt.job_id)
            .await
            .unwrap()
            .unwrap();
        if job.state == JobState::Failed && job.attempts == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let rows = harness.logs.find_by_task(task.id).await.unwrap();
    assert_eq!(rows.len(), 2);

    let err = harness.service.retry_job("no-such-job").await.unwrap_err();
    assert!(matches!(err, ServiceError::JobNotFound(_)));
}

#[tokio::test]
async fn test_queue_status_reflects_failures_and_upcoming_tasks() {
    let harness = harness().await;

    let status = harness.service.queue_status(7).await.unwrap();
    assert_eq!(status.status, ServiceHealth::Operational);
    assert!(status.upcoming.is_empty());
    assert_eq!(status.workers, 5);

    harness
        .tasks
        .insert(
            Task::new(
                "next week",
                today() + ChronoDuration::days(3),
                NotificationType::Request,
                "u1",
            )
            .with_time("08:00"),
        )
        .await;

    // A job for a task with no resolvable recipients fails
    let doomed = harness
        .tasks
        .insert(Task::new("doomed", today(), NotificationType::Task, "ghost"))
        .await;
    harness.service.process_task(doomed.id).await.unwrap();
    settled_task(&harness, doomed.id).await;

    let status = harness.service.queue_status(7).await.unwrap();
    assert_eq!(status.status, ServiceHealth::AttentionNeeded);
    assert_eq!(status.jobs.failed, 1);
    assert_eq!(status.upcoming.len(), 2);
    assert_eq!(status.upcoming[0].name, "doomed");
    assert_eq!(status.upcoming[1].name, "next week");
}

#[tokio::test]
async fn test_list_jobs_filtering_sorting_pagination() {
    let harness = harness().await;
    seed_recipient(&harness, "u1").await;

    let mut task_ids = Vec::new();
    for i in 0..4 {
        let task = harness
            .tasks
            .insert(Task::new(
                format!("job source {}", i),
                today(),
                NotificationType::Task,
                "u1",
            ))
            .await;
        harness.service.process_task(task.id).await.unwrap();
        task_ids.push(task.id);
    }
    for id in &task_ids {
        settled_task(&harness, *id).await;
    }

    let page = harness
        .service
        .list_jobs(JobQuery {
            states: vec![JobState::Completed],
            pagination: courier_core::Pagination::new(1, 3),
            ..JobQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(page.data.len(), 3);
    assert_eq!(page.pagination.total_items, 4);
    assert_eq!(page.pagination.total_pages, 2);

    let one = harness
        .service
        .list_jobs(JobQuery {
            task_id: Some(task_ids[0]),
            ..JobQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(one.data.len(), 1);
    assert_eq!(one.data[0].task_id, task_ids[0]);

    let by_attempts = harness
        .service
        .list_jobs(JobQuery {
            sort_by: JobSortKey::Attempts,
            ascending: true,
            ..JobQuery::default()
        })
        .await
        .unwrap();
    assert!(
        by_attempts
            .data
            .windows(2)
            .all(|pair| pair[0].attempts <= pair[1].attempts)
    );
}

#[tokio::test]
async fn test_clean_and_remove_jobs() {
    let harness = harness().await;
    seed_recipient(&harness, "u1").await;

    let mut job_ids = Vec::new();
    for i in 0..3 {
        let task = harness
            .tasks
            .insert(Task::new(
                format!("cleanup {}", i),
                today(),
                NotificationType::Task,
                "u1",
            ))
            .await;
        let receipt = harness.service.process_task(task.id).await.unwrap();
        settled_task(&harness, task.id).await;
        job_ids.push(receipt.job_id);
    }

    let removed = harness
        .service
        .clean_jobs(Duration::from_millis(0), JobState::Completed, 2)
        .await
        .unwrap();
    assert_eq!(removed.len(), 2);

    let counts = harness.service.get_job_counts().await.unwrap();
    assert_eq!(counts.completed, 1);

    let survivor = job_ids
        .iter()
        .find(|id| removed.iter().all(|job| &job.id != *id))
        .unwrap();
    harness.service.remove_job(survivor).await.unwrap();
    let err = harness.service.remove_job(survivor).await.unwrap_err();
    assert!(matches!(err, ServiceError::JobNotFound(_)));
}

#[tokio::test]
async fn test_notification_stats() {
    let harness = harness().await;
    seed_recipient(&harness, "u1").await;

    let good = harness
        .tasks
        .insert(Task::new("good", today(), NotificationType::Task, "u1"))
        .await;
    let bad = harness
        .tasks
        .insert(Task::new("bad", today(), NotificationType::Task, "ghost"))
        .await;
    harness.service.process_task(good.id).await.unwrap();
    harness.service.process_task(bad.id).await.unwrap();
    settled_task(&harness, good.id).await;
    settled_task(&harness, bad.id).await;

    let stats = harness.service.notification_stats().await.unwrap();
    assert_eq!(stats.total_sent, 2);
    assert_eq!(stats.successful, 1);
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn test_service_lifecycle_with_immediate_check() {
    let harness = harness().await;
    seed_recipient(&harness, "u1").await;
    let task = harness
        .tasks
        .insert(Task::new("startup", today(), NotificationType::Task, "u1"))
        .await;

    harness.service.start().await.unwrap();

    let task = settled_task(&harness, task.id).await;
    assert_eq!(task.status, TaskStatus::Completed);

    harness.service.shutdown().await.unwrap();
    // Shutdown is idempotent
    harness.service.shutdown().await.unwrap();
}
