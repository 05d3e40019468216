// Courier - notification task scheduling backend
//
// A periodic scheduler scans for due tasks and enqueues jobs; a worker
// renders and dispatches templated notifications per recipient, records an
// append-only delivery log, and drives task status transitions. The queue
// runs on Redis when configured and falls back to an in-memory backend
// otherwise.

pub mod error;
pub mod service;

pub use error::{ServiceError, ServiceResult};
pub use service::{
    JobQuery, JobSortKey, JobView, NotificationService, QueueStatus, ServiceHealth, ServiceStores,
    UpcomingTask,
};

// Re-export member crates
pub use courier_config;
pub use courier_core;
pub use courier_log;
pub use courier_notify;
pub use courier_queue;
pub use courier_scheduler;

// Prelude for common imports
pub mod prelude {
    pub use crate::error::{ServiceError, ServiceResult};
    pub use crate::service::{
        JobQuery, JobSortKey, JobView, NotificationService, QueueStatus, ServiceHealth,
        ServiceStores, UpcomingTask,
    };
    pub use courier_config::{Backoff, Environment, QueueSettings};
    pub use courier_core::{
        DeliveryStatus, NotificationLog, NotificationTemplate, NotificationType, Recipient,
        RecurrenceUnit, Task, TaskStatus,
    };
    pub use courier_notify::{NotificationDispatcher, NotificationProcessor, RecordingDispatcher};
    pub use courier_queue::{
        Job, JobCounts, JobOptions, JobPayload, JobQueue, JobState, JobTrigger, MemoryQueue,
        RedisQueue,
    };
    pub use courier_scheduler::{CheckOptions, CheckSummary, Scheduler, SchedulerConfig};
}
