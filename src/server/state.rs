use axum::extract::FromRef;

use crate::background_jobs::SchedulerHandle;
use crate::config::AppConfig;
use crate::history::SearchHistoryStore;
use crate::logging::{LogBuffer, LoggingControl};
use crate::search::WorkerRegistry;
use crate::state::StateStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use super::ServerConfig;

/// Replaced as a whole when settings are saved.
pub type GuardedAppConfig = Arc<RwLock<AppConfig>>;
pub type GuardedStateStore = Arc<dyn StateStore>;
pub type GuardedHistoryStore = Arc<dyn SearchHistoryStore>;
/// Workers of the enabled sources only.
pub type GuardedWorkers = Arc<WorkerRegistry>;
pub type OptionalSchedulerHandle = Option<SchedulerHandle>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub app_config: GuardedAppConfig,
    /// TOML file the settings API writes to.
    pub config_path: PathBuf,
    pub start_time: Instant,
    pub workers: GuardedWorkers,
    pub state_store: GuardedStateStore,
    pub history: GuardedHistoryStore,
    pub log_buffer: LogBuffer,
    pub logging: LoggingControl,
    pub scheduler_handle: OptionalSchedulerHandle,
    pub hash: String,
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedAppConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.app_config.clone()
    }
}

impl FromRef<ServerState> for GuardedHistoryStore {
    fn from_ref(input: &ServerState) -> Self {
        input.history.clone()
    }
}

impl FromRef<ServerState> for LogBuffer {
    fn from_ref(input: &ServerState) -> Self {
        input.log_buffer.clone()
    }
}
