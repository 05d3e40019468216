//! Store contracts consumed by the scheduler and worker.
//!
//! These traits are the seam to the persistence layer; the queue core never
//! touches storage directly. In-memory implementations live in
//! [`crate::memory`] for development and tests.

use crate::error::StoreResult;
use crate::notification_log::{LogStats, NewNotificationLog, NotificationLog};
use crate::recipient::Recipient;
use crate::task::{NotificationType, Task, TaskStatus};
use crate::template::NotificationTemplate;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Filter for task queries; all fields are conjunctive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub notification_type: Option<NotificationType>,
    /// Inclusive lower bound on `notification_date`
    pub from_date: Option<NaiveDate>,
    /// Inclusive upper bound on `notification_date`
    pub to_date: Option<NaiveDate>,
    /// Exact match on the "HH:MM" gate
    pub notification_time: Option<String>,
}

impl TaskFilter {
    /// Tasks with the given status.
    pub fn with_status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Restrict to a `notification_date` window (inclusive on both ends).
    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from_date = Some(from);
        self.to_date = Some(to);
        self
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
}

impl Pagination {
    pub fn new(page: usize, limit: usize) -> Self {
        Self {
            page: page.max(1),
            limit,
        }
    }

    /// Index of the first row on this page.
    pub fn offset(&self) -> usize {
        (self.page - 1) * self.limit
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

/// Pagination metadata attached to a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: usize,
    pub limit: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl PageInfo {
    pub fn new(pagination: Pagination, total_items: usize) -> Self {
        let total_pages = if pagination.limit == 0 {
            0
        } else {
            total_items.div_ceil(pagination.limit)
        };
        Self {
            page: pagination.page,
            limit: pagination.limit,
            total_items,
            total_pages,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

/// Partial update applied to a task.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub notification_date: Option<NaiveDate>,
    pub notification_time: Option<String>,
    pub recipient_list: Option<String>,
    pub status: Option<TaskStatus>,
    pub updated_by: Option<String>,
}

impl TaskPatch {
    /// Patch that only moves the task status.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Task persistence.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Query tasks matching the filter, newest first.
    async fn find(&self, filter: TaskFilter, pagination: Pagination) -> StoreResult<Page<Task>>;

    /// Load a task or fail with `StoreError::NotFound`.
    async fn find_one(&self, id: Uuid) -> StoreResult<Task>;

    /// Apply a partial update and return the updated task.
    async fn update(&self, id: Uuid, patch: TaskPatch) -> StoreResult<Task>;

    /// Delete a task; returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

/// Template persistence.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// The active template for a notification type, or `NotFound`.
    async fn find_by_type(
        &self,
        notification_type: NotificationType,
    ) -> StoreResult<NotificationTemplate>;

    /// Persist a template; template names are unique (`Conflict` otherwise).
    async fn create(&self, template: NotificationTemplate) -> StoreResult<NotificationTemplate>;
}

/// Recipient directory lookup.
#[async_trait]
pub trait RecipientResolver: Send + Sync {
    /// Resolve a recipient id, or fail with `StoreError::NotFound`.
    async fn find_one(&self, id: &str) -> StoreResult<Recipient>;
}

/// Delivery log persistence.
#[async_trait]
pub trait NotificationLogStore: Send + Sync {
    /// Append a log row.
    async fn create(&self, record: NewNotificationLog) -> StoreResult<NotificationLog>;

    /// All rows for a task, most recent first.
    async fn find_by_task(&self, task_id: Uuid) -> StoreResult<Vec<NotificationLog>>;

    /// Aggregate delivery counters.
    async fn stats(&self) -> StoreResult<LogStats>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_offset() {
        assert_eq!(Pagination::new(1, 20).offset(), 0);
        assert_eq!(Pagination::new(3, 20).offset(), 40);
    }

    #[test]
    fn test_pagination_page_floor() {
        assert_eq!(Pagination::new(0, 20).page, 1);
    }

    #[test]
    fn test_page_info_rounding() {
        let info = PageInfo::new(Pagination::new(1, 10), 25);
        assert_eq!(info.total_pages, 3);

        let info = PageInfo::new(Pagination::new(1, 10), 30);
        assert_eq!(info.total_pages, 3);

        let info = PageInfo::new(Pagination::new(1, 10), 0);
        assert_eq!(info.total_pages, 0);
    }
}
