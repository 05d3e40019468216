//! The outbound notification seam.
//!
//! Transport (SMTP, provider APIs) lives outside this crate; the worker only
//! talks to [`NotificationDispatcher`]. Type-specific sends default to the
//! generic email send so implementations override only what they
//! distinguish.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Failure delivering to a single recipient.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DispatchError {
    pub message: String,
}

impl DispatchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Inline attachment referenced from a rendered body (`cid:` links).
///
/// Content is optional: transports with asset access may resolve it from the
/// filename alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub cid: String,
    pub content_base64: Option<String>,
}

impl Attachment {
    /// Attachment referencing an asset by name, resolved by the transport.
    pub fn by_reference(filename: impl Into<String>) -> Self {
        let filename = filename.into();
        Self {
            cid: filename.clone(),
            filename,
            content_base64: None,
        }
    }
}

/// Outbound notification transport.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Generic email send; the fallback for every notification type.
    async fn send_email(
        &self,
        recipient_name: &str,
        recipient_email: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DispatchError>;

    /// Document reminder, with inline attachments (organization logo).
    async fn document_notification(
        &self,
        recipient_name: &str,
        recipient_email: &str,
        subject: &str,
        body: &str,
        attachments: &[Attachment],
    ) -> Result<(), DispatchError> {
        let _ = attachments;
        self.send_email(recipient_name, recipient_email, subject, body)
            .await
    }

    /// Request reminder.
    async fn request_notification(
        &self,
        recipient_name: &str,
        recipient_email: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DispatchError> {
        self.send_email(recipient_name, recipient_email, subject, body)
            .await
    }

    /// Task reminder.
    async fn task_notification(
        &self,
        recipient_name: &str,
        recipient_email: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DispatchError> {
        self.send_email(recipient_name, recipient_email, subject, body)
            .await
    }
}

/// A message captured by [`RecordingDispatcher`].
#[derive(Debug, Clone)]
pub struct SentNotification {
    pub recipient_name: String,
    pub recipient_email: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

/// Capturing dispatcher for tests and development wiring.
///
/// Records every send; individual addresses can be made to fail with
/// [`RecordingDispatcher::fail_for`].
#[derive(Clone, Default)]
pub struct RecordingDispatcher {
    sent: Arc<Mutex<Vec<SentNotification>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to this address fail.
    pub async fn fail_for(&self, email: impl Into<String>) {
        self.failing.lock().await.insert(email.into());
    }

    /// All messages captured so far.
    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    async fn record(
        &self,
        recipient_name: &str,
        recipient_email: &str,
        subject: &str,
        body: &str,
        attachments: &[Attachment],
    ) -> Result<(), DispatchError> {
        if self.failing.lock().await.contains(recipient_email) {
            return Err(DispatchError::new(format!(
                "Delivery to {} refused",
                recipient_email
            )));
        }

        self.sent.lock().await.push(SentNotification {
            recipient_name: recipient_name.to_string(),
            recipient_email: recipient_email.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            attachments: attachments.to_vec(),
        });
        Ok(())
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn send_email(
        &self,
        recipient_name: &str,
        recipient_email: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DispatchError> {
        self.record(recipient_name, recipient_email, subject, body, &[])
            .await
    }

    async fn document_notification(
        &self,
        recipient_name: &str,
        recipient_email: &str,
        subject: &str,
        body: &str,
        attachments: &[Attachment],
    ) -> Result<(), DispatchError> {
        self.record(recipient_name, recipient_email, subject, body, attachments)
            .await
    }
}
