//! Notification templates.

use crate::task::NotificationType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A subject/body pair with `{{placeholder}}` tokens, keyed by notification
/// type. At most one template per type should be active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationTemplate {
    pub id: Uuid,
    /// Unique template name
    pub template_name: String,
    pub notification_type: NotificationType,
    pub subject_template: String,
    pub body_template: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationTemplate {
    /// Create an active template.
    pub fn new(
        template_name: impl Into<String>,
        notification_type: NotificationType,
        subject_template: impl Into<String>,
        body_template: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            template_name: template_name.into(),
            notification_type,
            subject_template: subject_template.into(),
            body_template: body_template.into(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Built-in reminder template for a notification type, synthesized when
    /// no active template exists for it.
    pub fn default_for(notification_type: NotificationType) -> Self {
        let (subject, body) = match notification_type {
            NotificationType::Document => (
                "Reminder: document {{document_name}} is about to expire",
                "Document {{document_name}} expires soon. Please review the details.",
            ),
            NotificationType::Request => (
                "Reminder: request {{request_name}} is about to expire",
                "Request {{request_name}} expires soon. Please review the details.",
            ),
            NotificationType::Task => (
                "Reminder: task {{task_name}}",
                "You have a pending task: {{task_name}}. Description: {{task_description}}",
            ),
        };

        Self::new(
            format!("Default {} template", notification_type),
            notification_type,
            subject,
            body,
        )
    }
}
