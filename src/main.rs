use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use fetcharr::arr::{RadarrClient, SonarrClient};
use fetcharr::background_jobs::create_scheduler;
use fetcharr::background_jobs::jobs::SearchCycleJob;
use fetcharr::config::{AppConfig, CliConfig, FileConfig};
use fetcharr::history::{SearchHistoryStore, SqliteSearchHistoryStore};
use fetcharr::logging::{self, LogBuffer};
use fetcharr::search::WorkerRegistry;
use fetcharr::server::{metrics, run_metrics_server, run_server, RequestsLoggingLevel, ServerState};
use fetcharr::startup;
use fetcharr::state::JsonFileStateStore;

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| e.to_string())?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[clap(version)]
struct CliArgs {
    /// Path to the TOML config file. Defaults to `<data-dir>/fetcharr.toml`.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding the config, state file and history database.
    #[clap(long, value_parser = parse_path, default_value = "/config")]
    pub data_dir: PathBuf,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 8080)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// Address both servers bind to.
    #[clap(long, default_value = "0.0.0.0")]
    pub bind_address: String,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            data_dir: args.data_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            bind_address: args.bind_address.clone(),
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let config_path = cli_args
        .config
        .clone()
        .unwrap_or_else(|| cli_args.data_dir.join("fetcharr.toml"));
    if !config_path.exists() {
        FileConfig::write_default(&config_path)?;
        eprintln!(
            "No config found. A default config was written to {}.\n\
             Edit it with your Radarr/Sonarr URLs and API keys, then restart Fetcharr.",
            config_path.display()
        );
        std::process::exit(1);
    }

    // Resolve final configuration (TOML overrides CLI)
    let file_config = FileConfig::load(&config_path)?;
    let cli_config: CliConfig = (&cli_args).into();
    let app_config = AppConfig::resolve(&cli_config, Some(file_config))?;

    let log_buffer = LogBuffer::default();
    let logging = logging::init_logging(
        &app_config.log_level,
        &app_config.secrets(),
        log_buffer.clone(),
    )?;

    startup::print_banner(&app_config);
    info!("Configuration loaded from {:?}", config_path);
    for warning in &app_config.warnings {
        warn!("{}", warning);
    }

    info!("Initializing metrics...");
    metrics::init_metrics();

    std::fs::create_dir_all(&app_config.data_dir)
        .with_context(|| format!("Failed to create data dir {:?}", app_config.data_dir))?;
    let state_store = Arc::new(JsonFileStateStore::open(app_config.state_path())?);
    info!(
        "Opening search history database at {:?}...",
        app_config.history_db_path()
    );
    let history = Arc::new(SqliteSearchHistoryStore::new(app_config.history_db_path())?);

    let legacy_log = state_store.take_legacy_search_log();
    if !legacy_log.is_empty() {
        let imported = history.import_legacy(&legacy_log)?;
        state_store.flush()?;
        info!("Moved {} search log entries into the history database", imported);
    }

    let radarr = if app_config.radarr.is_active() {
        Some(RadarrClient::new(
            &app_config.radarr.url,
            &app_config.radarr.api_key,
        )?)
    } else {
        None
    };
    let sonarr = if app_config.sonarr.is_active() {
        Some(SonarrClient::new(
            &app_config.sonarr.url,
            &app_config.sonarr.api_key,
        )?)
    } else {
        None
    };

    if startup::check_enabled_apps(&app_config) {
        startup::check_localhost_urls(&app_config);
        startup::validate_connections(radarr.as_ref(), sonarr.as_ref()).await;
    }

    let workers = WorkerRegistry::new(state_store.clone(), history.clone());
    if let Some(client) = radarr {
        workers.insert(workers.radarr_worker(client, &app_config));
    }
    if let Some(client) = sonarr {
        workers.insert(workers.sonarr_worker(client, &app_config));
    }

    // Set up background job scheduler
    let shutdown_token = CancellationToken::new();
    let (mut scheduler, scheduler_handle) = create_scheduler(shutdown_token.clone());
    for source in workers.sources() {
        if let Some(worker) = workers.get(source) {
            let interval = app_config.search_interval(source);
            scheduler
                .register_job(Arc::new(SearchCycleJob::new(worker, interval)))
                .await;
            info!(
                "Scheduled {} search every {}m (first run: now)",
                source,
                interval.as_secs() / 60
            );
        }
    }

    let bind_address = app_config.bind_address.clone();
    let metrics_port = app_config.metrics_port;
    let server_state = ServerState {
        config: (&app_config).into(),
        app_config: Arc::new(RwLock::new(app_config)),
        config_path,
        start_time: Instant::now(),
        workers: Arc::new(workers),
        state_store,
        history,
        log_buffer,
        logging,
        scheduler_handle: Some(scheduler_handle),
        hash: env!("GIT_HASH").to_string(),
    };

    // Run HTTP servers and job scheduler concurrently
    let mut scheduler_task = tokio::spawn(async move { scheduler.run().await });
    let result = tokio::select! {
        result = run_server(server_state) => {
            info!("HTTP server stopped: {:?}", result);
            result
        },
        result = run_metrics_server(&bind_address, metrics_port) => {
            info!("Metrics server stopped: {:?}", result);
            result
        },
        _ = &mut scheduler_task => {
            info!("Scheduler stopped");
            Ok(())
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            Ok(())
        }
    };

    // Running jobs get the scheduler's grace period to finish.
    shutdown_token.cancel();
    if !scheduler_task.is_finished() {
        if let Err(err) = scheduler_task.await {
            error!("Scheduler task failed: {}", err);
        }
    }
    result
}
