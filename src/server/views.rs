//! JSON shapes served by the API.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::state::ServerState;
use crate::background_jobs::jobs::SearchCycleJob;
use crate::background_jobs::JobRunInfo;
use crate::config::{AppConfig, SourceSettings};
use crate::search::SourceKind;

#[derive(Debug, Serialize)]
pub struct SourceStatus {
    pub name: &'static str,
    pub display_name: &'static str,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub missing_cursor: usize,
    pub cutoff_cursor: usize,
    pub connected: Option<bool>,
    pub unreachable_since: Option<DateTime<Utc>>,
    pub missing_count: Option<usize>,
    pub cutoff_count: Option<usize>,
    pub running: bool,
    /// Latest scheduled or in-progress run of the source's search job.
    pub last_job: Option<JobRunInfo>,
}

impl SourceStatus {
    /// `None` when `source` has no worker, i.e. is not enabled.
    pub async fn build(state: &ServerState, source: SourceKind) -> Option<Self> {
        let worker = state.workers.get(source)?;
        let saved = state.state_store.load(source);
        let job_id = SearchCycleJob::job_id(source);
        let (next_run, last_job) = match &state.scheduler_handle {
            Some(handle) => (handle.next_run_at(job_id).await, handle.last_run(job_id).await),
            None => (None, None),
        };

        Some(SourceStatus {
            name: source.as_str(),
            display_name: source.display_name(),
            last_run: saved.last_run,
            next_run,
            missing_cursor: saved.missing_cursor,
            cutoff_cursor: saved.cutoff_cursor,
            connected: saved.connected,
            unreachable_since: saved.unreachable_since,
            missing_count: saved.missing_count,
            cutoff_count: saved.cutoff_count,
            running: worker.is_running(),
            last_job,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct GeneralSettingsView {
    pub log_level: String,
    pub hard_max_per_cycle: usize,
    pub bind_address: String,
    pub port: u16,
    pub metrics_port: u16,
    pub data_dir: String,
}

/// Source settings with the API key reduced to a presence flag.
#[derive(Debug, Serialize)]
pub struct SourceSettingsView {
    pub enabled: bool,
    pub url: String,
    pub has_api_key: bool,
    pub search_interval: u64,
    pub search_missing_count: usize,
    pub search_cutoff_count: usize,
}

impl From<&SourceSettings> for SourceSettingsView {
    fn from(settings: &SourceSettings) -> Self {
        SourceSettingsView {
            enabled: settings.enabled,
            url: settings.url.clone(),
            has_api_key: !settings.api_key.is_empty(),
            search_interval: settings.search_interval_minutes,
            search_missing_count: settings.search_missing_count,
            search_cutoff_count: settings.search_cutoff_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SettingsView {
    pub general: GeneralSettingsView,
    pub radarr: SourceSettingsView,
    pub sonarr: SourceSettingsView,
}

impl From<&AppConfig> for SettingsView {
    fn from(config: &AppConfig) -> Self {
        SettingsView {
            general: GeneralSettingsView {
                log_level: config.log_level.clone(),
                hard_max_per_cycle: config.hard_max_per_cycle,
                bind_address: config.bind_address.clone(),
                port: config.port,
                metrics_port: config.metrics_port,
                data_dir: config.data_dir.display().to_string(),
            },
            radarr: (&config.radarr).into(),
            sonarr: (&config.sonarr).into(),
        }
    }
}
