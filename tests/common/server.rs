//! Test server lifecycle management
//!
//! Spawns the API router on a random port, wired to real Radarr/Sonarr
//! clients that talk to [`FakeArr`] instances.

use super::constants::*;
use super::fake_arr::FakeArr;
use fetcharr::background_jobs::{create_scheduler, SchedulerHandle};
use fetcharr::config::{AppConfig, ArrConfig, CliConfig, FileConfig};
use fetcharr::history::{SearchHistoryStore, SqliteSearchHistoryStore};
use fetcharr::logging::{LogBuffer, LoggingControl};
use fetcharr::search::WorkerRegistry;
use fetcharr::server::{make_app, RequestsLoggingLevel, ServerState};
use fetcharr::state::{JsonFileStateStore, StateStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Test server instance with an isolated data directory.
///
/// When dropped, the server shuts down and the data directory is removed.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Host header value matching `base_url`
    pub host: String,

    pub history: Arc<dyn SearchHistoryStore>,
    pub state_store: Arc<dyn StateStore>,
    pub log_buffer: LogBuffer,
    pub logging: LoggingControl,
    pub workers: Arc<WorkerRegistry>,
    /// Starts empty; jobs appear once settings enable or retune a source.
    pub scheduler: SchedulerHandle,
    pub config_path: PathBuf,

    _data_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    scheduler_shutdown: CancellationToken,
}

/// Base URL the server can reach `fake` on. Loopback IP literals are
/// rejected by config validation.
pub fn reachable_url(fake: &FakeArr) -> String {
    fake.base_url.replace("127.0.0.1", "localhost")
}

fn arr_config(fake: &FakeArr) -> ArrConfig {
    ArrConfig {
        url: Some(reachable_url(fake)),
        api_key: Some(TEST_API_KEY.to_string()),
        enabled: Some(true),
        search_interval: Some(15),
        search_missing_count: Some(2),
        search_cutoff_count: Some(1),
    }
}

impl TestServer {
    pub async fn spawn_with_radarr(radarr: &FakeArr) -> Self {
        Self::spawn(Some(radarr), None).await
    }

    /// Spawns a server with a worker for each fake that is passed.
    pub async fn spawn(radarr: Option<&FakeArr>, sonarr: Option<&FakeArr>) -> Self {
        let data_dir = TempDir::new().expect("Failed to create data dir");

        let cli = CliConfig {
            data_dir: data_dir.path().to_path_buf(),
            port: 0,
            metrics_port: 0,
            bind_address: "127.0.0.1".to_string(),
            logging_level: RequestsLoggingLevel::None,
            frontend_dir_path: None,
        };
        let file = FileConfig {
            general: None,
            radarr: radarr.map(arr_config),
            sonarr: sonarr.map(arr_config),
        };
        let config_path = data_dir.path().join("fetcharr.toml");
        file.save(&config_path).expect("Failed to write config");
        let app_config = AppConfig::resolve(&cli, Some(file)).expect("Invalid config");

        let state_store: Arc<dyn StateStore> = Arc::new(
            JsonFileStateStore::open(app_config.state_path()).expect("Failed to open state"),
        );
        let history: Arc<dyn SearchHistoryStore> = Arc::new(
            SqliteSearchHistoryStore::new(app_config.history_db_path())
                .expect("Failed to open history"),
        );

        let workers = Arc::new(WorkerRegistry::new(state_store.clone(), history.clone()));
        if let Some(fake) = radarr {
            workers.insert(workers.radarr_worker(fake.radarr_client(), &app_config));
        }
        if let Some(fake) = sonarr {
            workers.insert(workers.sonarr_worker(fake.sonarr_client(), &app_config));
        }

        let scheduler_shutdown = CancellationToken::new();
        let (mut scheduler, scheduler_handle) = create_scheduler(scheduler_shutdown.clone());
        tokio::spawn(async move { scheduler.run().await });

        let log_buffer = LogBuffer::default();
        let logging = LoggingControl::default();
        let state = ServerState {
            config: (&app_config).into(),
            app_config: Arc::new(RwLock::new(app_config)),
            config_path: config_path.clone(),
            start_time: Instant::now(),
            workers: workers.clone(),
            state_store: state_store.clone(),
            history: history.clone(),
            log_buffer: log_buffer.clone(),
            logging: logging.clone(),
            scheduler_handle: Some(scheduler_handle.clone()),
            hash: "test".to_string(),
        };

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let app = make_app(state);
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url: format!("http://127.0.0.1:{}", port),
            host: format!("127.0.0.1:{}", port),
            history,
            state_store,
            log_buffer,
            logging,
            workers,
            scheduler: scheduler_handle,
            config_path,
            _data_dir: data_dir,
            _shutdown_tx: Some(shutdown_tx),
            scheduler_shutdown,
        };

        server.wait_for_ready().await;

        server
    }

    /// Polls /health until the server answers
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/health", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.scheduler_shutdown.cancel();
    }
}
