//! Per-job notification processing.
//!
//! One [`NotificationProcessor::process`] call handles one dequeued job:
//! load the task, mark it processing, resolve recipients and a template,
//! render and dispatch per recipient, record exactly one delivery-log row,
//! and move the task to its terminal status. Every failure is contained to
//! the job at hand; the error travels back to the queue so its retry policy
//! applies.

use crate::dispatcher::{Attachment, NotificationDispatcher};
use crate::error::{NotifyError, NotifyResult};
use crate::template::render;
use chrono::Utc;
use courier_core::{
    DeliveryStatus, NewNotificationLog, NotificationLogStore, NotificationTemplate,
    NotificationType, Recipient, RecipientResolver, StoreError, Task, TaskPatch, TaskStatus,
    TaskStore, TemplateStore,
};
use courier_log::{error, info, warn};
use courier_queue::{Job, JobHandler, QueueError, job_handler};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Delivery outcome for one recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientOutcome {
    /// Recipient email address
    pub recipient: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Aggregate outcome of one processing attempt; stored as the job's return
/// value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSummary {
    /// At least one recipient received the notification
    pub success: bool,
    /// Some but not all recipients received it
    pub partial_success: bool,
    pub subject: String,
    pub body: String,
    /// Resolved recipients, as recorded in the delivery log
    pub recipients: serde_json::Value,
    pub results: Vec<RecipientOutcome>,
    pub error: Option<String>,
}

impl DispatchSummary {
    /// Whether every recipient received the notification.
    pub fn all_succeeded(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|r| r.success)
    }
}

/// Processes notification jobs against the store and dispatcher seams.
pub struct NotificationProcessor {
    tasks: Arc<dyn TaskStore>,
    templates: Arc<dyn TemplateStore>,
    recipients: Arc<dyn RecipientResolver>,
    logs: Arc<dyn NotificationLogStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl NotificationProcessor {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        templates: Arc<dyn TemplateStore>,
        recipients: Arc<dyn RecipientResolver>,
        logs: Arc<dyn NotificationLogStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            tasks,
            templates,
            recipients,
            logs,
            dispatcher,
        }
    }

    /// Adapter producing the queue handler for this processor.
    pub fn handler(self: Arc<Self>) -> JobHandler {
        job_handler(move |job| {
            let processor = self.clone();
            async move {
                match processor.process(&job).await {
                    Ok(summary) => serde_json::to_value(&summary)
                        .map_err(|e| QueueError::Serialization(e.to_string())),
                    Err(err) => Err(QueueError::ExecutionFailed(err.to_string())),
                }
            }
        })
    }

    /// Process one job end to end.
    pub async fn process(&self, job: &Job) -> NotifyResult<DispatchSummary> {
        let task_id = job.task_id();
        info!(
            target: "courier::worker",
            "Processing notification job {} for task {} (attempt {})",
            job.id, task_id, job.attempts_made.max(1)
        );

        // Without a task there is nothing to log against; the failure is
        // still recorded at the queue level.
        let task = match self.tasks.find_one(task_id).await {
            Ok(task) => task,
            Err(StoreError::NotFound(_)) => return Err(NotifyError::TaskNotFound(task_id)),
            Err(e) => return Err(e.into()),
        };

        self.tasks
            .update(task_id, TaskPatch::status(TaskStatus::Processing))
            .await?;

        match self.deliver(&task).await {
            Ok(summary) => {
                let status = if summary.success {
                    DeliveryStatus::Success
                } else {
                    DeliveryStatus::Failed
                };

                self.logs
                    .create(NewNotificationLog {
                        task_id,
                        sent_at: Utc::now(),
                        status,
                        error_message: summary.error.clone(),
                        recipients: Some(summary.recipients.clone()),
                        subject: summary.subject.clone(),
                        body: summary.body.clone(),
                    })
                    .await?;

                let terminal = if summary.all_succeeded() {
                    TaskStatus::Completed
                } else {
                    TaskStatus::Failed
                };
                self.tasks
                    .update(task_id, TaskPatch::status(terminal))
                    .await?;

                info!(
                    target: "courier::worker",
                    "Notification job {} processed for task {}: success={} partial={}",
                    job.id, task_id, summary.success, summary.partial_success
                );

                if summary.success {
                    Ok(summary)
                } else {
                    Err(NotifyError::Dispatch(
                        summary
                            .error
                            .unwrap_or_else(|| "Failed to send to all recipients".to_string()),
                    ))
                }
            }
            Err(err) => {
                error!(
                    target: "courier::worker",
                    "Error processing notification job {} for task {}: {}",
                    job.id, task_id, err
                );

                // Best-effort failure log; its own failure must not mask
                // the original error
                let details = serde_json::json!({
                    "message": "Error processing notification job",
                    "jobId": job.id,
                    "taskId": task_id.to_string(),
                    "error": err.to_string(),
                    "attempt": job.attempts_made.max(1),
                });
                if let Err(log_err) = self
                    .logs
                    .create(NewNotificationLog {
                        task_id,
                        sent_at: Utc::now(),
                        status: DeliveryStatus::Failed,
                        error_message: Some(err.to_string()),
                        recipients: None,
                        subject: "Error processing notification".to_string(),
                        body: details.to_string(),
                    })
                    .await
                {
                    error!(
                        target: "courier::worker",
                        "Failed to create error log for job {}: {}", job.id, log_err
                    );
                }

                if let Err(update_err) = self
                    .tasks
                    .update(task_id, TaskPatch::status(TaskStatus::Failed))
                    .await
                {
                    error!(
                        target: "courier::worker",
                        "Failed to mark task {} failed: {}", task_id, update_err
                    );
                }

                Err(err)
            }
        }
    }

    /// Resolve recipients and template, render, and dispatch to every
    /// recipient. Individual dispatch failures are collected, never fatal.
    async fn deliver(&self, task: &Task) -> NotifyResult<DispatchSummary> {
        let recipient_ids = task.recipients();
        if recipient_ids.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        let template = self.resolve_template(task.notification_type).await?;

        let mut resolved: Vec<Recipient> = Vec::with_capacity(recipient_ids.len());
        for id in recipient_ids {
            match self.recipients.find_one(&id).await {
                Ok(recipient) if !recipient.email.is_empty() => resolved.push(recipient),
                Ok(_) => {
                    warn!(
                        target: "courier::notifier",
                        "Recipient {} has no email address, skipping", id
                    );
                }
                Err(e) => {
                    warn!(
                        target: "courier::notifier",
                        "Could not resolve recipient {}: {}", id, e
                    );
                }
            }
        }

        if resolved.is_empty() {
            return Err(NotifyError::NoValidRecipients);
        }

        let mut subject = String::new();
        let mut body = String::new();
        let mut results = Vec::with_capacity(resolved.len());

        for recipient in &resolved {
            subject = render(&template.subject_template, task, recipient);
            body = render(&template.body_template, task, recipient);

            let sent = self.dispatch(task, recipient, &subject, &body).await;
            match sent {
                Ok(()) => results.push(RecipientOutcome {
                    recipient: recipient.email.clone(),
                    success: true,
                    error: None,
                }),
                Err(e) => {
                    error!(
                        target: "courier::notifier",
                        "Error sending notification to {}: {}", recipient.email, e
                    );
                    results.push(RecipientOutcome {
                        recipient: recipient.email.clone(),
                        success: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let all_successful = results.iter().all(|r| r.success);
        let any_successful = results.iter().any(|r| r.success);

        Ok(DispatchSummary {
            success: any_successful,
            partial_success: any_successful && !all_successful,
            subject,
            body,
            recipients: serde_json::json!({ "list": resolved }),
            results,
            error: if all_successful {
                None
            } else {
                Some("Failed to send to some or all recipients".to_string())
            },
        })
    }

    /// Active template for the type, or a persisted synthesized default.
    async fn resolve_template(
        &self,
        notification_type: NotificationType,
    ) -> NotifyResult<NotificationTemplate> {
        match self.templates.find_by_type(notification_type).await {
            Ok(template) => Ok(template),
            Err(StoreError::NotFound(_)) => {
                let default = NotificationTemplate::default_for(notification_type);
                info!(
                    target: "courier::notifier",
                    "No active template for type {}, synthesizing '{}'",
                    notification_type, default.template_name
                );
                match self.templates.create(default.clone()).await {
                    Ok(persisted) => Ok(persisted),
                    Err(StoreError::Conflict(_)) => Ok(default),
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn dispatch(
        &self,
        task: &Task,
        recipient: &Recipient,
        subject: &str,
        body: &str,
    ) -> Result<(), crate::dispatcher::DispatchError> {
        match task.notification_type {
            NotificationType::Document => {
                let attachments: Vec<Attachment> = recipient
                    .organization
                    .as_ref()
                    .and_then(|org| org.logo.as_deref())
                    .map(|logo| vec![Attachment::by_reference(logo)])
                    .unwrap_or_default();
                self.dispatcher
                    .document_notification(
                        &recipient.display_name,
                        &recipient.email,
                        subject,
                        body,
                        &attachments,
                    )
                    .await
            }
            NotificationType::Request => {
                self.dispatcher
                    .request_notification(&recipient.display_name, &recipient.email, subject, body)
                    .await
            }
            NotificationType::Task => {
                self.dispatcher
                    .task_notification(&recipient.display_name, &recipient.email, subject, body)
                    .await
            }
        }
    }
}
