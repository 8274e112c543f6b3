use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;

use super::models::SourceKind;
use super::strategy::{MovieStrategy, SeasonStrategy};
use super::worker::{CycleRunner, SearchWorker};
use crate::arr::{ArrError, RadarrClient, SonarrClient};
use crate::config::AppConfig;
use crate::history::SearchHistoryStore;
use crate::state::StateStore;

/// The workers of the enabled sources. Sources can be connected, replaced and
/// dropped while the server runs; every worker built for a source shares that
/// source's cycle lock.
pub struct WorkerRegistry {
    state_store: Arc<dyn StateStore>,
    history: Arc<dyn SearchHistoryStore>,
    cycle_locks: HashMap<SourceKind, Arc<Mutex<()>>>,
    workers: RwLock<HashMap<SourceKind, Arc<dyn CycleRunner>>>,
}

impl WorkerRegistry {
    pub fn new(state_store: Arc<dyn StateStore>, history: Arc<dyn SearchHistoryStore>) -> Self {
        let cycle_locks = SourceKind::ALL
            .into_iter()
            .map(|source| (source, Arc::new(Mutex::new(()))))
            .collect();
        Self {
            state_store,
            history,
            cycle_locks,
            workers: RwLock::new(HashMap::new()),
        }
    }

    fn cycle_lock(&self, source: SourceKind) -> Arc<Mutex<()>> {
        self.cycle_locks
            .get(&source)
            .cloned()
            .unwrap_or_else(|| Arc::new(Mutex::new(())))
    }

    pub fn radarr_worker(&self, client: RadarrClient, config: &AppConfig) -> Arc<dyn CycleRunner> {
        let source = SourceKind::Radarr;
        Arc::new(
            SearchWorker::new(
                source,
                MovieStrategy,
                client,
                config.cycle_limits(source),
                self.state_store.clone(),
                self.history.clone(),
            )
            .with_cycle_lock(self.cycle_lock(source)),
        )
    }

    pub fn sonarr_worker(&self, client: SonarrClient, config: &AppConfig) -> Arc<dyn CycleRunner> {
        let source = SourceKind::Sonarr;
        Arc::new(
            SearchWorker::new(
                source,
                SeasonStrategy,
                client,
                config.cycle_limits(source),
                self.state_store.clone(),
                self.history.clone(),
            )
            .with_cycle_lock(self.cycle_lock(source)),
        )
    }

    /// Builds a worker with a fresh client from `config`, without installing it.
    pub fn connect(&self, source: SourceKind, config: &AppConfig) -> Result<Arc<dyn CycleRunner>, ArrError> {
        let settings = config.source(source);
        Ok(match source {
            SourceKind::Radarr => {
                self.radarr_worker(RadarrClient::new(&settings.url, &settings.api_key)?, config)
            }
            SourceKind::Sonarr => {
                self.sonarr_worker(SonarrClient::new(&settings.url, &settings.api_key)?, config)
            }
        })
    }

    /// Installs `worker` for its source, returning the one it replaces.
    pub fn insert(&self, worker: Arc<dyn CycleRunner>) -> Option<Arc<dyn CycleRunner>> {
        self.workers.write().unwrap().insert(worker.source(), worker)
    }

    pub fn get(&self, source: SourceKind) -> Option<Arc<dyn CycleRunner>> {
        self.workers.read().unwrap().get(&source).cloned()
    }

    pub fn remove(&self, source: SourceKind) -> Option<Arc<dyn CycleRunner>> {
        self.workers.write().unwrap().remove(&source)
    }

    /// Sources with a worker installed, in [`SourceKind::ALL`] order.
    pub fn sources(&self) -> Vec<SourceKind> {
        let workers = self.workers.read().unwrap();
        SourceKind::ALL
            .into_iter()
            .filter(|source| workers.contains_key(source))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CliConfig;
    use crate::history::SqliteSearchHistoryStore;
    use crate::state::JsonFileStateStore;

    fn registry(dir: &tempfile::TempDir) -> WorkerRegistry {
        let state = Arc::new(JsonFileStateStore::open(dir.path().join("state.json")).unwrap());
        let history = Arc::new(SqliteSearchHistoryStore::in_memory().unwrap());
        WorkerRegistry::new(state, history)
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::resolve(&CliConfig::default(), None).unwrap();
        config.sonarr.enabled = true;
        config.sonarr.url = "http://sonarr:8989".to_string();
        config.sonarr.api_key = "sonarr-key".to_string();
        config.radarr.url = "http://radarr:7878".to_string();
        config
    }

    #[test]
    fn connect_builds_without_installing() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);

        let worker = registry.connect(SourceKind::Sonarr, &config()).unwrap();

        assert_eq!(worker.source(), SourceKind::Sonarr);
        assert!(registry.get(SourceKind::Sonarr).is_none());
        assert!(registry.sources().is_empty());
    }

    #[test]
    fn insert_replaces_and_remove_drops() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        let config = config();

        assert!(registry
            .insert(registry.connect(SourceKind::Sonarr, &config).unwrap())
            .is_none());
        assert!(registry
            .insert(registry.connect(SourceKind::Sonarr, &config).unwrap())
            .is_some());
        assert_eq!(registry.sources(), vec![SourceKind::Sonarr]);

        assert!(registry.remove(SourceKind::Sonarr).is_some());
        assert!(registry.get(SourceKind::Sonarr).is_none());
    }

    #[tokio::test]
    async fn replacement_workers_share_the_cycle_lock() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(&dir);
        let config = config();
        let first = registry.connect(SourceKind::Sonarr, &config).unwrap();
        let second = registry.connect(SourceKind::Sonarr, &config).unwrap();

        let lock = registry.cycle_lock(SourceKind::Sonarr);
        let _guard = lock.lock().await;

        assert!(first.is_running());
        assert!(second.is_running());
        assert!(!registry.connect(SourceKind::Radarr, &config).unwrap().is_running());
    }
}
