use super::context::JobContext;
use async_trait::async_trait;
use std::time::Duration;

/// Schedule for when a job should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSchedule {
    /// Run right after registration, then at fixed intervals.
    Interval(Duration),
}

impl JobSchedule {
    pub fn interval(&self) -> Duration {
        match self {
            JobSchedule::Interval(interval) => *interval,
        }
    }
}

/// Errors that can occur during job execution.
#[derive(Debug)]
pub enum JobError {
    SchedulerUnavailable,
    ExecutionFailed(String),
    Cancelled,
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::SchedulerUnavailable => write!(f, "Scheduler not available"),
            JobError::ExecutionFailed(msg) => write!(f, "Execution failed: {}", msg),
            JobError::Cancelled => write!(f, "Job was cancelled"),
        }
    }
}

impl std::error::Error for JobError {}

/// Trait for background jobs.
#[async_trait]
pub trait BackgroundJob: Send + Sync {
    /// Unique identifier for this job.
    fn id(&self) -> &'static str;

    /// Human-readable name for this job.
    fn name(&self) -> &'static str;

    /// Description of what this job does.
    fn description(&self) -> String;

    /// When this job should be scheduled to run.
    fn schedule(&self) -> JobSchedule;

    /// Execute the job. Implementations should check `ctx.is_cancelled()`
    /// before doing anything expensive.
    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;
}
