//! Append-only delivery log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate delivery outcome of one processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Success,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row per processing attempt. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationLog {
    pub id: Uuid,
    pub task_id: Uuid,
    pub sent_at: DateTime<Utc>,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
    /// Opaque record of the resolved recipients; `None` when processing
    /// failed before any recipient was resolved
    pub recipients: Option<serde_json::Value>,
    pub subject: String,
    pub body: String,
}

/// Log row as submitted by the worker, before the store assigns an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotificationLog {
    pub task_id: Uuid,
    pub sent_at: DateTime<Utc>,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
    pub recipients: Option<serde_json::Value>,
    pub subject: String,
    pub body: String,
}

impl NewNotificationLog {
    /// Attach a store-assigned id.
    pub fn into_log(self, id: Uuid) -> NotificationLog {
        NotificationLog {
            id,
            task_id: self.task_id,
            sent_at: self.sent_at,
            status: self.status,
            error_message: self.error_message,
            recipients: self.recipients,
            subject: self.subject,
            body: self.body,
        }
    }
}

/// Aggregate delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStats {
    pub total_sent: u64,
    pub successful: u64,
    pub failed: u64,
}
