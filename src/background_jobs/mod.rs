//! Background job scheduling and execution.
//!
//! Jobs run on fixed intervals, at most one instance of each at a time.

mod context;
mod handle;
mod job;
pub mod jobs;
mod scheduler;

pub use context::JobContext;
pub use handle::{JobRunInfo, SchedulerHandle};
pub use job::{BackgroundJob, JobError, JobSchedule};
pub use scheduler::{create_scheduler, JobScheduler};
