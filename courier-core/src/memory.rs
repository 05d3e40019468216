//! In-memory store implementations for development and testing.
//!
//! All stores share the same shape: a `HashMap` behind a `tokio` `RwLock`,
//! cloneable handles, and the exact filter/pagination semantics of the store
//! contracts. Nothing here is durable.

use crate::error::{StoreError, StoreResult};
use crate::notification_log::{DeliveryStatus, LogStats, NewNotificationLog, NotificationLog};
use crate::recipient::Recipient;
use crate::store::{
    NotificationLogStore, Page, PageInfo, Pagination, RecipientResolver, TaskFilter, TaskPatch,
    TaskStore, TemplateStore,
};
use crate::task::{NotificationType, Task};
use crate::template::NotificationTemplate;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory [`TaskStore`].
#[derive(Clone, Default)]
pub struct MemoryTaskStore {
    tasks: Arc<RwLock<HashMap<Uuid, Task>>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a task directly (test/dev helper).
    pub async fn insert(&self, task: Task) -> Task {
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id, task.clone());
        task
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

fn matches(task: &Task, filter: &TaskFilter) -> bool {
    if let Some(status) = filter.status
        && task.status != status
    {
        return false;
    }
    if let Some(kind) = filter.notification_type
        && task.notification_type != kind
    {
        return false;
    }
    if let Some(from) = filter.from_date
        && task.notification_date < from
    {
        return false;
    }
    if let Some(to) = filter.to_date
        && task.notification_date > to
    {
        return false;
    }
    if let Some(time) = &filter.notification_time
        && task.notification_time.as_deref() != Some(time.as_str())
    {
        return false;
    }
    true
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn find(&self, filter: TaskFilter, pagination: Pagination) -> StoreResult<Page<Task>> {
        let tasks = self.tasks.read().await;
        let mut hits: Vec<Task> = tasks
            .values()
            .filter(|task| matches(task, &filter))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = hits.len();
        let data: Vec<Task> = hits
            .into_iter()
            .skip(pagination.offset())
            .take(pagination.limit)
            .collect();

        Ok(Page {
            data,
            pagination: PageInfo::new(pagination, total),
        })
    }

    async fn find_one(&self, id: Uuid) -> StoreResult<Task> {
        let tasks = self.tasks.read().await;
        tasks
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Task with ID {} not found", id)))
    }

    async fn update(&self, id: Uuid, patch: TaskPatch) -> StoreResult<Task> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Task with ID {} not found", id)))?;

        if let Some(name) = patch.name {
            task.name = name;
        }
        if let Some(description) = patch.description {
            task.description = Some(description);
        }
        if let Some(date) = patch.notification_date {
            task.notification_date = date;
        }
        if let Some(time) = patch.notification_time {
            task.notification_time = Some(time);
        }
        if let Some(recipient_list) = patch.recipient_list {
            task.recipient_list = recipient_list;
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(updated_by) = patch.updated_by {
            task.updated_by = Some(updated_by);
        }
        task.updated_at = Utc::now();

        Ok(task.clone())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut tasks = self.tasks.write().await;
        Ok(tasks.remove(&id).is_some())
    }
}

/// In-memory [`TemplateStore`].
#[derive(Clone, Default)]
pub struct MemoryTemplateStore {
    templates: Arc<RwLock<HashMap<Uuid, NotificationTemplate>>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.templates.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.templates.read().await.is_empty()
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn find_by_type(
        &self,
        notification_type: NotificationType,
    ) -> StoreResult<NotificationTemplate> {
        let templates = self.templates.read().await;
        templates
            .values()
            .find(|t| t.notification_type == notification_type && t.active)
            .cloned()
            .ok_or_else(|| {
                StoreError::NotFound(format!(
                    "No active template found for type: {}",
                    notification_type
                ))
            })
    }

    async fn create(&self, template: NotificationTemplate) -> StoreResult<NotificationTemplate> {
        let mut templates = self.templates.write().await;
        if templates
            .values()
            .any(|t| t.template_name == template.template_name)
        {
            return Err(StoreError::Conflict(format!(
                "Template with name '{}' already exists",
                template.template_name
            )));
        }
        templates.insert(template.id, template.clone());
        Ok(template)
    }
}

/// In-memory [`RecipientResolver`].
#[derive(Clone, Default)]
pub struct MemoryRecipientDirectory {
    recipients: Arc<RwLock<HashMap<String, Recipient>>>,
}

impl MemoryRecipientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a recipient (test/dev helper).
    pub async fn add(&self, recipient: Recipient) {
        let mut recipients = self.recipients.write().await;
        recipients.insert(recipient.id.clone(), recipient);
    }
}

#[async_trait]
impl RecipientResolver for MemoryRecipientDirectory {
    async fn find_one(&self, id: &str) -> StoreResult<Recipient> {
        let recipients = self.recipients.read().await;
        recipients
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Recipient {} not found", id)))
    }
}

/// In-memory [`NotificationLogStore`].
#[derive(Clone, Default)]
pub struct MemoryNotificationLogStore {
    logs: Arc<RwLock<Vec<NotificationLog>>>,
}

impl MemoryNotificationLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<NotificationLog> {
        self.logs.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.logs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.logs.read().await.is_empty()
    }
}

#[async_trait]
impl NotificationLogStore for MemoryNotificationLogStore {
    async fn create(&self, record: NewNotificationLog) -> StoreResult<NotificationLog> {
        let log = record.into_log(Uuid::new_v4());
        let mut logs = self.logs.write().await;
        logs.push(log.clone());
        Ok(log)
    }

    async fn find_by_task(&self, task_id: Uuid) -> StoreResult<Vec<NotificationLog>> {
        let logs = self.logs.read().await;
        let mut hits: Vec<NotificationLog> = logs
            .iter()
            .filter(|log| log.task_id == task_id)
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        Ok(hits)
    }

    async fn stats(&self) -> StoreResult<LogStats> {
        let logs = self.logs.read().await;
        let successful = logs
            .iter()
            .filter(|log| log.status == DeliveryStatus::Success)
            .count() as u64;
        let total_sent = logs.len() as u64;
        Ok(LogStats {
            total_sent,
            successful,
            failed: total_sent - successful,
        })
    }
}
