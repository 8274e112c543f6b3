//! Saving settings from the API and applying them to the running server.

use std::sync::Arc;

use tracing::{info, warn};

use super::state::ServerState;
use super::views::SettingsView;
use crate::background_jobs::jobs::SearchCycleJob;
use crate::config::{AppConfig, CliConfig, FileConfig, SettingsError, SettingsUpdate};
use crate::search::{CycleRunner, SourceKind};

/// What saving the settings does to one source.
enum SourceChange {
    Disable,
    /// A new worker with a fresh client, for a new or moved instance.
    Reconnect(Arc<dyn CycleRunner>),
    /// Same client; limits and interval may have changed.
    Retune(Arc<dyn CycleRunner>),
}

fn storage_error(err: anyhow::Error) -> SettingsError {
    SettingsError::Storage(format!("{:#}", err))
}

/// Merges `update` into the config file and validates the result. Nothing is
/// written unless the whole edit is valid. Once written, the log filter and
/// redaction, each source's worker and its scheduled search follow the new
/// settings.
pub async fn apply_settings(
    state: &ServerState,
    update: SettingsUpdate,
) -> Result<SettingsView, SettingsError> {
    // Held throughout, so concurrent saves apply one after the other.
    let mut config = state.app_config.write().await;

    let file = if state.config_path.exists() {
        FileConfig::load(&state.config_path).map_err(storage_error)?
    } else {
        FileConfig::default()
    };
    let merged = update.apply_to(file)?;
    let resolved = AppConfig::resolve(&CliConfig::from(&*config), Some(merged.clone()))
        .map_err(|e| SettingsError::Rejected(format!("{:#}", e)))?;

    let mut changes = Vec::new();
    for source in SourceKind::ALL {
        changes.push((source, plan_source(state, &config, &resolved, source)?));
    }

    merged.save(&state.config_path).map_err(storage_error)?;
    info!("Settings saved to {:?}", state.config_path);

    if let Err(err) = state.logging.apply(&resolved.log_level, &resolved.secrets()) {
        warn!("{:#}", err);
    }
    for (source, change) in changes {
        apply_source_change(state, &config, &resolved, source, change).await;
    }

    *config = resolved;
    Ok(SettingsView::from(&*config))
}

fn plan_source(
    state: &ServerState,
    current: &AppConfig,
    resolved: &AppConfig,
    source: SourceKind,
) -> Result<SourceChange, SettingsError> {
    let new = resolved.source(source);
    if !new.is_active() {
        return Ok(SourceChange::Disable);
    }

    let old = current.source(source);
    match state.workers.get(source) {
        Some(worker) if new.url == old.url && new.api_key == old.api_key => {
            Ok(SourceChange::Retune(worker))
        }
        _ => state
            .workers
            .connect(source, resolved)
            .map(SourceChange::Reconnect)
            .map_err(|e| SettingsError::Rejected(format!("{}: {}", source.display_name(), e))),
    }
}

async fn apply_source_change(
    state: &ServerState,
    current: &AppConfig,
    resolved: &AppConfig,
    source: SourceKind,
    change: SourceChange,
) {
    let job_id = SearchCycleJob::job_id(source);

    let (worker, replaced) = match change {
        SourceChange::Disable => {
            let had_worker = state.workers.remove(source).is_some();
            if let Some(handle) = &state.scheduler_handle {
                if let Err(err) = handle.remove_job(job_id).await {
                    warn!("{}: failed to unschedule search: {}", source, err);
                }
            }
            if had_worker {
                info!("{} disabled", source);
            }
            return;
        }
        SourceChange::Reconnect(worker) => {
            if state.workers.insert(worker.clone()).is_some() {
                info!("{}: connection settings changed, client rebuilt", source);
            } else {
                info!("{} enabled", source);
            }
            (worker, true)
        }
        SourceChange::Retune(worker) => {
            worker.set_limits(resolved.cycle_limits(source));
            (worker, false)
        }
    };

    let Some(handle) = &state.scheduler_handle else {
        return;
    };
    let interval = resolved.search_interval(source);
    let interval_changed = interval != current.search_interval(source);
    if replaced || interval_changed || !handle.has_job(job_id).await {
        let job = Arc::new(SearchCycleJob::new(worker, interval));
        match handle.schedule_job(job).await {
            Ok(()) => info!(
                "Scheduled {} search every {}m",
                source,
                interval.as_secs() / 60
            ),
            Err(err) => warn!("{}: failed to schedule search: {}", source, err),
        }
    }
}
