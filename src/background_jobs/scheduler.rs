use super::context::JobContext;
use super::handle::{JobRunInfo, SchedulerCommand, SchedulerHandle, SharedJobState};
use super::job::{BackgroundJob, JobError};
use crate::server::metrics;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Longest the loop sleeps without re-checking the schedule.
const MAX_SLEEP: Duration = Duration::from_secs(60);

/// How long shutdown waits for running jobs.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Manages background job scheduling and execution.
pub struct JobScheduler {
    /// Shared state accessible by SchedulerHandle
    shared_state: Arc<RwLock<SharedJobState>>,

    /// Currently running jobs with their task handles (not shared, managed by scheduler loop)
    running_handles: HashMap<String, JoinHandle<()>>,

    /// Cancellation tokens for each running job.
    job_cancel_tokens: HashMap<String, CancellationToken>,

    /// Receiver for commands from SchedulerHandle
    command_receiver: mpsc::Receiver<SchedulerCommand>,

    /// Token to signal scheduler shutdown.
    shutdown_token: CancellationToken,

    job_context: JobContext,
}

impl JobScheduler {
    fn new(
        command_receiver: mpsc::Receiver<SchedulerCommand>,
        shutdown_token: CancellationToken,
        shared_state: Arc<RwLock<SharedJobState>>,
    ) -> Self {
        let job_context = JobContext::new(shutdown_token.child_token());
        Self {
            shared_state,
            running_handles: HashMap::new(),
            job_cancel_tokens: HashMap::new(),
            command_receiver,
            shutdown_token,
            job_context,
        }
    }

    /// Register a job with the scheduler. Its first run is due immediately.
    pub async fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        let job_id = job.id().to_string();
        info!("Registering job: {} - {}", job_id, job.description());
        let mut state = self.shared_state.write().await;
        state.next_runs.insert(job_id.clone(), Utc::now());
        state.jobs.insert(job_id, job);
    }

    /// Get the number of registered jobs.
    pub async fn job_count(&self) -> usize {
        self.shared_state.read().await.jobs.len()
    }

    /// Main scheduler loop, returns once the shutdown token is cancelled.
    pub async fn run(&mut self) {
        let job_count = self.job_count().await;
        info!("Starting job scheduler with {} registered jobs", job_count);

        loop {
            self.cleanup_completed_jobs();

            let sleep_duration = self.time_until_next_scheduled_job().await;
            debug!(
                "Scheduler sleeping for {:?} until next scheduled job",
                sleep_duration
            );

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {
                    self.run_due_jobs().await;
                }
                Some(cmd) = self.command_receiver.recv() => {
                    self.handle_command(cmd).await;
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    async fn handle_command(&mut self, cmd: SchedulerCommand) {
        match cmd {
            SchedulerCommand::ScheduleJob { job, response } => {
                self.schedule_job(job).await;
                let _ = response.send(());
            }
            SchedulerCommand::RemoveJob { job_id, response } => {
                let removed = self.remove_job(&job_id).await;
                let _ = response.send(removed);
            }
        }
    }

    /// A replaced job keeps its current run, if any, and is next due one
    /// interval from now.
    async fn schedule_job(&mut self, job: Arc<dyn BackgroundJob>) {
        let job_id = job.id().to_string();
        let now = Utc::now();
        let mut state = self.shared_state.write().await;
        let next_run = if state.jobs.contains_key(&job_id) {
            info!("Rescheduling job: {} - {}", job_id, job.description());
            after(now, job.schedule().interval())
        } else {
            info!("Registering job: {} - {}", job_id, job.description());
            now
        };
        state.next_runs.insert(job_id.clone(), next_run);
        state.jobs.insert(job_id, job);
    }

    /// A run in progress is left to finish.
    async fn remove_job(&mut self, job_id: &str) -> bool {
        let mut state = self.shared_state.write().await;
        state.next_runs.remove(job_id);
        state.last_runs.remove(job_id);
        let removed = state.jobs.remove(job_id).is_some();
        if removed {
            info!("Removed job: {}", job_id);
        }
        removed
    }

    async fn time_until_next_scheduled_job(&self) -> Duration {
        let now = Utc::now();
        let state = self.shared_state.read().await;
        state
            .next_runs
            .values()
            .map(|next_run| (*next_run - now).to_std().unwrap_or(Duration::ZERO))
            .min()
            .map_or(MAX_SLEEP, |d| d.min(MAX_SLEEP))
    }

    /// Spawns every due job. A job still running from its previous tick is
    /// skipped and rescheduled one interval later.
    async fn run_due_jobs(&mut self) {
        let now = Utc::now();
        let mut jobs_to_run = Vec::new();

        {
            let mut state = self.shared_state.write().await;
            let due: Vec<(String, Duration)> = state
                .next_runs
                .iter()
                .filter(|(_, next_run)| **next_run <= now)
                .filter_map(|(job_id, _)| {
                    let job = state.jobs.get(job_id)?;
                    Some((job_id.clone(), job.schedule().interval()))
                })
                .collect();

            for (job_id, interval) in due {
                if state.running_jobs.contains(&job_id) {
                    warn!(
                        "Skipping scheduled run of {}: previous run still in progress",
                        job_id
                    );
                    state.next_runs.insert(job_id, after(now, interval));
                } else {
                    jobs_to_run.push(job_id);
                }
            }
        }

        for job_id in jobs_to_run {
            self.spawn_job(&job_id, "schedule").await;
        }
    }

    async fn spawn_job(&mut self, job_id: &str, triggered_by: &str) {
        let started_at = Utc::now();
        let job = {
            let mut state = self.shared_state.write().await;
            let job = match state.jobs.get(job_id) {
                Some(job) => Arc::clone(job),
                None => {
                    error!("Attempted to spawn unknown job: {}", job_id);
                    return;
                }
            };
            state.running_jobs.insert(job_id.to_string());
            state
                .next_runs
                .insert(job_id.to_string(), after(started_at, job.schedule().interval()));
            state.last_runs.insert(
                job_id.to_string(),
                JobRunInfo {
                    started_at,
                    finished_at: None,
                    status: "running".to_string(),
                    error_message: None,
                    triggered_by: triggered_by.to_string(),
                },
            );
            job
        };

        debug!(
            "Starting job: {} ({}, triggered_by: {})",
            job_id,
            job.name(),
            triggered_by
        );
        metrics::set_background_job_running(job_id, true);

        let cancel_token = self.job_context.cancellation_token.child_token();
        self.job_cancel_tokens
            .insert(job_id.to_string(), cancel_token.clone());
        let ctx = JobContext::new(cancel_token);

        let job_id_owned = job_id.to_string();
        let triggered_by = triggered_by.to_string();
        let shared_state = Arc::clone(&self.shared_state);

        let handle = tokio::spawn(async move {
            let start_time = Instant::now();
            // Inner task so a panicking job surfaces as a JoinError.
            let result = tokio::spawn(async move { job.execute(&ctx).await }).await;
            let elapsed = start_time.elapsed();

            let (status, error_message) = match result {
                Ok(Ok(())) => {
                    debug!("Job {} completed in {:?}", job_id_owned, elapsed);
                    ("completed", None)
                }
                Ok(Err(JobError::Cancelled)) => {
                    info!("Job {} was cancelled after {:?}", job_id_owned, elapsed);
                    ("cancelled", Some("Cancelled".to_string()))
                }
                Ok(Err(e)) => {
                    warn!("Job {} failed after {:?}: {}", job_id_owned, elapsed, e);
                    ("failed", Some(e.to_string()))
                }
                Err(e) => {
                    error!("Job {} panicked after {:?}: {}", job_id_owned, elapsed, e);
                    ("panic", Some(format!("Task panic: {}", e)))
                }
            };

            metrics::record_background_job_execution(&job_id_owned, status, elapsed);
            metrics::set_background_job_running(&job_id_owned, false);

            let mut state = shared_state.write().await;
            state.running_jobs.remove(&job_id_owned);
            state.last_runs.insert(
                job_id_owned,
                JobRunInfo {
                    started_at,
                    finished_at: Some(Utc::now()),
                    status: status.to_string(),
                    error_message,
                    triggered_by,
                },
            );
        });

        self.running_handles.insert(job_id.to_string(), handle);
    }

    fn cleanup_completed_jobs(&mut self) {
        let completed: Vec<String> = self
            .running_handles
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(job_id, _)| job_id.clone())
            .collect();

        for job_id in completed {
            self.running_handles.remove(&job_id);
            self.job_cancel_tokens.remove(&job_id);
        }
    }

    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");

        for (job_id, token) in &self.job_cancel_tokens {
            debug!("Cancelling job: {}", job_id);
            token.cancel();
        }

        for (job_id, handle) in self.running_handles.drain() {
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                warn!("Job {} did not finish before shutdown", job_id);
            }
        }

        self.job_cancel_tokens.clear();
        info!("Scheduler shutdown complete");
    }
}

fn after(start: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    start + chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::days(1))
}

/// Create a scheduler and its handle.
pub fn create_scheduler(shutdown_token: CancellationToken) -> (JobScheduler, SchedulerHandle) {
    let (command_tx, command_rx) = mpsc::channel(100);
    let shared_state = Arc::new(RwLock::new(SharedJobState::default()));

    let scheduler = JobScheduler::new(command_rx, shutdown_token, Arc::clone(&shared_state));
    let handle = SchedulerHandle::new(command_tx, shared_state);

    (scheduler, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background_jobs::JobSchedule;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct TestJob {
        id: &'static str,
        interval: Duration,
        duration: Duration,
        execution_count: Arc<AtomicUsize>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
        should_fail: Arc<AtomicBool>,
    }

    impl TestJob {
        fn new(id: &'static str, interval: Duration) -> Self {
            Self {
                id,
                interval,
                duration: Duration::ZERO,
                execution_count: Arc::new(AtomicUsize::new(0)),
                in_flight: Arc::new(AtomicUsize::new(0)),
                max_in_flight: Arc::new(AtomicUsize::new(0)),
                should_fail: Arc::new(AtomicBool::new(false)),
            }
        }

        fn taking(mut self, duration: Duration) -> Self {
            self.duration = duration;
            self
        }
    }

    #[async_trait]
    impl BackgroundJob for TestJob {
        fn id(&self) -> &'static str {
            self.id
        }

        fn name(&self) -> &'static str {
            "Test Job"
        }

        fn description(&self) -> String {
            "A test job for unit tests".to_string()
        }

        fn schedule(&self) -> JobSchedule {
            JobSchedule::Interval(self.interval)
        }

        async fn execute(&self, _ctx: &JobContext) -> Result<(), JobError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.execution_count.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.duration).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.should_fail.load(Ordering::SeqCst) {
                Err(JobError::ExecutionFailed("Test failure".to_string()))
            } else {
                Ok(())
            }
        }
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_register_job() {
        let (mut scheduler, handle) = create_scheduler(CancellationToken::new());
        assert!(!handle.has_job("test_job").await);

        scheduler
            .register_job(Arc::new(TestJob::new("test_job", HOUR)))
            .await;

        assert!(handle.has_job("test_job").await);
        assert!(handle.last_run("test_job").await.is_none());
        assert!(handle.next_run_at("test_job").await.unwrap() <= Utc::now());
        assert_eq!(scheduler.job_count().await, 1);
    }

    #[tokio::test]
    async fn test_first_run_is_immediate() {
        let shutdown_token = CancellationToken::new();
        let (mut scheduler, handle) = create_scheduler(shutdown_token.clone());
        let job = TestJob::new("startup_job", HOUR);
        let exec_count = job.execution_count.clone();
        scheduler.register_job(Arc::new(job)).await;

        let sched_handle = tokio::spawn(async move {
            scheduler.run().await;
        });
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(exec_count.load(Ordering::SeqCst), 1);
        let last_run = handle.last_run("startup_job").await.unwrap();
        assert_eq!(last_run.status, "completed");
        assert_eq!(last_run.triggered_by, "schedule");
        assert!(last_run.finished_at.is_some());
        assert!(handle.next_run_at("startup_job").await.unwrap() > Utc::now());

        shutdown_token.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(2), sched_handle).await;
    }

    #[tokio::test]
    async fn test_failed_job_records_error() {
        let shutdown_token = CancellationToken::new();
        let (mut scheduler, handle) = create_scheduler(shutdown_token.clone());
        let job = TestJob::new("failing_job", HOUR);
        job.should_fail.store(true, Ordering::SeqCst);
        scheduler.register_job(Arc::new(job)).await;

        let sched_handle = tokio::spawn(async move {
            scheduler.run().await;
        });
        tokio::time::sleep(Duration::from_millis(200)).await;

        let last_run = handle.last_run("failing_job").await.unwrap();
        assert_eq!(last_run.status, "failed");
        assert_eq!(
            last_run.error_message.as_deref(),
            Some("Execution failed: Test failure")
        );

        shutdown_token.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(2), sched_handle).await;
    }

    #[tokio::test]
    async fn test_overdue_job_is_skipped_while_running() {
        let shutdown_token = CancellationToken::new();
        let (mut scheduler, _handle) = create_scheduler(shutdown_token.clone());
        let job = TestJob::new("slow_job", Duration::from_millis(50))
            .taking(Duration::from_millis(200));
        let exec_count = job.execution_count.clone();
        let max_in_flight = job.max_in_flight.clone();
        scheduler.register_job(Arc::new(job)).await;

        let sched_handle = tokio::spawn(async move {
            scheduler.run().await;
        });
        tokio::time::sleep(Duration::from_millis(330)).await;

        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        let runs = exec_count.load(Ordering::SeqCst);
        assert!((1..=3).contains(&runs), "unexpected run count {}", runs);

        shutdown_token.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(2), sched_handle).await;
    }

    #[tokio::test]
    async fn test_scheduled_job_wakes_idle_scheduler() {
        let shutdown_token = CancellationToken::new();
        let (mut scheduler, handle) = create_scheduler(shutdown_token.clone());
        let sched_handle = tokio::spawn(async move {
            scheduler.run().await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let job = TestJob::new("late_job", HOUR);
        let exec_count = job.execution_count.clone();
        handle.schedule_job(Arc::new(job)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(exec_count.load(Ordering::SeqCst), 1);
        assert_eq!(handle.last_run("late_job").await.unwrap().status, "completed");

        shutdown_token.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(2), sched_handle).await;
    }

    #[tokio::test]
    async fn test_rescheduled_job_waits_one_new_interval() {
        let shutdown_token = CancellationToken::new();
        let (mut scheduler, handle) = create_scheduler(shutdown_token.clone());
        let original = TestJob::new("cycle_job", HOUR);
        let original_count = original.execution_count.clone();
        scheduler.register_job(Arc::new(original)).await;
        let sched_handle = tokio::spawn(async move {
            scheduler.run().await;
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(original_count.load(Ordering::SeqCst), 1);

        let replacement = TestJob::new("cycle_job", 2 * HOUR);
        let replacement_count = replacement.execution_count.clone();
        let before = Utc::now();
        handle.schedule_job(Arc::new(replacement)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(replacement_count.load(Ordering::SeqCst), 0);
        let next_run = handle.next_run_at("cycle_job").await.unwrap();
        assert!(next_run >= before + chrono::Duration::hours(2));
        assert!(next_run <= Utc::now() + chrono::Duration::hours(2));

        shutdown_token.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(2), sched_handle).await;
    }

    #[tokio::test]
    async fn test_removed_job_stops_running() {
        let shutdown_token = CancellationToken::new();
        let (mut scheduler, handle) = create_scheduler(shutdown_token.clone());
        let job = TestJob::new("doomed_job", Duration::from_millis(100));
        let exec_count = job.execution_count.clone();
        scheduler.register_job(Arc::new(job)).await;
        let sched_handle = tokio::spawn(async move {
            scheduler.run().await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(handle.remove_job("doomed_job").await.unwrap());
        assert!(!handle.remove_job("doomed_job").await.unwrap());
        let runs = exec_count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(exec_count.load(Ordering::SeqCst), runs);
        assert!(!handle.has_job("doomed_job").await);
        assert!(handle.next_run_at("doomed_job").await.is_none());

        shutdown_token.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(2), sched_handle).await;
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_running_job() {
        let shutdown_token = CancellationToken::new();
        let (mut scheduler, _handle) = create_scheduler(shutdown_token.clone());
        let job = TestJob::new("busy_job", HOUR).taking(Duration::from_millis(300));
        let in_flight = job.in_flight.clone();
        scheduler.register_job(Arc::new(job)).await;
        let sched_handle = tokio::spawn(async move {
            scheduler.run().await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(in_flight.load(Ordering::SeqCst), 1);

        shutdown_token.cancel();
        tokio::time::timeout(Duration::from_secs(2), sched_handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_commands_without_scheduler_fail() {
        let (scheduler, handle) = create_scheduler(CancellationToken::new());
        drop(scheduler);

        let scheduled = handle
            .schedule_job(Arc::new(TestJob::new("anything", HOUR)))
            .await;
        let removed = handle.remove_job("anything").await;

        assert!(matches!(scheduled, Err(JobError::SchedulerUnavailable)));
        assert!(matches!(removed, Err(JobError::SchedulerUnavailable)));
    }
}
