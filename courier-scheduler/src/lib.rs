//! Scheduling for the Courier notification pipeline.
//!
//! - [`Scheduler`] — owns the periodic timer; scans for due tasks and
//!   enqueues jobs with de-duplication, recurrence, and time-of-day gating.
//! - [`recurrence::is_due`] — pure recurrence evaluation.

pub mod error;
pub mod recurrence;
pub mod scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use recurrence::is_due;
pub use scheduler::{
    CheckOptions, CheckSummary, ProcessReceipt, QueuedTask, Scheduler, SchedulerConfig, TaskError,
    TaskRef,
};
