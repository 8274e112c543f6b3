use super::job::{BackgroundJob, JobError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};

/// Serializable job run information.
#[derive(Debug, Clone, Serialize)]
pub struct JobRunInfo {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// `running`, `completed`, `failed`, `cancelled` or `panic`.
    pub status: String,
    pub error_message: Option<String>,
    pub triggered_by: String,
}

/// Command sent to the scheduler.
pub enum SchedulerCommand {
    /// Add a job, or replace the registered job with the same id.
    ScheduleJob {
        job: Arc<dyn BackgroundJob>,
        response: oneshot::Sender<()>,
    },
    RemoveJob {
        job_id: String,
        response: oneshot::Sender<bool>,
    },
}

/// Shared state between scheduler and handle.
#[derive(Default)]
pub struct SharedJobState {
    pub jobs: HashMap<String, Arc<dyn BackgroundJob>>,
    /// Currently running job IDs
    pub running_jobs: HashSet<String>,
    pub next_runs: HashMap<String, DateTime<Utc>>,
    pub last_runs: HashMap<String, JobRunInfo>,
}

/// Handle to interact with the job scheduler from HTTP handlers.
#[derive(Clone)]
pub struct SchedulerHandle {
    /// Channel to send commands to the scheduler
    command_tx: mpsc::Sender<SchedulerCommand>,
    /// Shared state for reading job info
    shared_state: Arc<RwLock<SharedJobState>>,
}

impl SchedulerHandle {
    pub fn new(
        command_tx: mpsc::Sender<SchedulerCommand>,
        shared_state: Arc<RwLock<SharedJobState>>,
    ) -> Self {
        Self {
            command_tx,
            shared_state,
        }
    }

    pub async fn has_job(&self, job_id: &str) -> bool {
        self.shared_state.read().await.jobs.contains_key(job_id)
    }

    pub async fn next_run_at(&self, job_id: &str) -> Option<DateTime<Utc>> {
        self.shared_state.read().await.next_runs.get(job_id).copied()
    }

    /// Outcome of the job's latest run, or the run still in progress.
    pub async fn last_run(&self, job_id: &str) -> Option<JobRunInfo> {
        self.shared_state.read().await.last_runs.get(job_id).cloned()
    }

    /// Adds `job`, due immediately. A job already registered under the same id
    /// is replaced and next runs one new interval from now.
    pub async fn schedule_job(&self, job: Arc<dyn BackgroundJob>) -> Result<(), JobError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(SchedulerCommand::ScheduleJob {
                job,
                response: response_tx,
            })
            .await
            .map_err(|_| JobError::SchedulerUnavailable)?;

        response_rx.await.map_err(|_| JobError::SchedulerUnavailable)
    }

    /// Unregisters a job. Returns whether it was registered.
    pub async fn remove_job(&self, job_id: &str) -> Result<bool, JobError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(SchedulerCommand::RemoveJob {
                job_id: job_id.to_string(),
                response: response_tx,
            })
            .await
            .map_err(|_| JobError::SchedulerUnavailable)?;

        response_rx.await.map_err(|_| JobError::SchedulerUnavailable)
    }
}
