//! Periodic search cycle for one source.

use crate::background_jobs::{BackgroundJob, JobContext, JobError, JobSchedule};
use crate::search::{CycleOutcome, CycleRunner, SourceKind};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Runs one search cycle through the source's worker on every tick. The
/// worker's cycle lock is shared with manual "search now" requests.
pub struct SearchCycleJob {
    runner: Arc<dyn CycleRunner>,
    interval: Duration,
}

impl SearchCycleJob {
    pub fn new(runner: Arc<dyn CycleRunner>, interval: Duration) -> Self {
        Self { runner, interval }
    }

    /// Job id used for a source's search job.
    pub fn job_id(source: SourceKind) -> &'static str {
        match source {
            SourceKind::Radarr => "radarr_search",
            SourceKind::Sonarr => "sonarr_search",
        }
    }
}

#[async_trait]
impl BackgroundJob for SearchCycleJob {
    fn id(&self) -> &'static str {
        Self::job_id(self.runner.source())
    }

    fn name(&self) -> &'static str {
        match self.runner.source() {
            SourceKind::Radarr => "Radarr Search",
            SourceKind::Sonarr => "Sonarr Search",
        }
    }

    fn description(&self) -> String {
        format!(
            "Search the next batch of {} missing and cutoff items every {}m",
            self.runner.source(),
            self.interval.as_secs() / 60
        )
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Interval(self.interval)
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        match self.runner.run_cycle_now().await {
            CycleOutcome::Completed(_) => Ok(()),
            CycleOutcome::Aborted(err) => Err(JobError::ExecutionFailed(err.to_string())),
        }
    }
}
