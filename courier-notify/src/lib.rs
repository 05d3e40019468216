//! Notification rendering and job processing for Courier.
//!
//! - [`template::render`] — literal `{{token}}` substitution of task and
//!   recipient data into subject/body templates.
//! - [`NotificationDispatcher`] — the outbound transport seam, with
//!   type-specific sends defaulting to a generic email send.
//! - [`NotificationProcessor`] — the worker pipeline invoked once per
//!   dequeued job.

pub mod dispatcher;
pub mod error;
pub mod processor;
pub mod template;

pub use dispatcher::{
    Attachment, DispatchError, NotificationDispatcher, RecordingDispatcher, SentNotification,
};
pub use error::{NotifyError, NotifyResult};
pub use processor::{DispatchSummary, NotificationProcessor, RecipientOutcome};
pub use template::render;
