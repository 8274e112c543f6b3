use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use tower_http::services::ServeDir;
use tracing::info;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::settings::apply_settings;
use super::views::{SettingsView, SourceStatus};
use super::{check_origin, log_requests, metrics, state::*};
use crate::config::SettingsUpdate;
use crate::logging::LogBuffer;
use crate::search::{CycleRunner, SourceKind};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 500;
pub const DEFAULT_LOGS_LIMIT: usize = 50;
pub const MAX_LOGS_LIMIT: usize = 200;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: &'static str,
    pub hash: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct LimitQuery {
    pub limit: Option<usize>,
}

impl LimitQuery {
    fn resolve(&self, default: usize, max: usize) -> usize {
        self.limit.unwrap_or(default).clamp(1, max)
    }
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: env!("CARGO_PKG_VERSION"),
        hash: state.hash.clone(),
    };
    Json(stats)
}

async fn health() -> &'static str {
    "OK"
}

/// Maps a route segment to an enabled source's worker, or the 400 to send.
fn resolve_worker(
    state: &ServerState,
    app_name: &str,
) -> Result<(SourceKind, Arc<dyn CycleRunner>), Response> {
    let source: SourceKind = app_name
        .parse()
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid app").into_response())?;
    match state.workers.get(source) {
        Some(worker) => Ok((source, worker)),
        None => Err((StatusCode::BAD_REQUEST, "App not enabled").into_response()),
    }
}

async fn status_response(state: &ServerState, source: SourceKind) -> Response {
    match SourceStatus::build(state, source).await {
        Some(status) => Json(status).into_response(),
        None => (StatusCode::BAD_REQUEST, "App not enabled").into_response(),
    }
}

async fn get_all_status(State(state): State<ServerState>) -> impl IntoResponse {
    let mut statuses = Vec::new();
    for source in SourceKind::ALL {
        if let Some(status) = SourceStatus::build(&state, source).await {
            statuses.push(status);
        }
    }
    Json(statuses)
}

async fn get_source_status(
    State(state): State<ServerState>,
    Path(app_name): Path<String>,
) -> Response {
    match resolve_worker(&state, &app_name) {
        Ok((source, _)) => status_response(&state, source).await,
        Err(response) => response,
    }
}

async fn search_now(State(state): State<ServerState>, Path(app_name): Path<String>) -> Response {
    let (source, worker) = match resolve_worker(&state, &app_name) {
        Ok(found) => found,
        Err(response) => return response,
    };

    info!("{}: Manual search triggered", source);
    worker.run_cycle_now().await;

    status_response(&state, source).await
}

async fn get_history(
    State(history): State<GuardedHistoryStore>,
    Query(query): Query<LimitQuery>,
) -> Response {
    let limit = query.resolve(DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT);
    match history.recent(limit) {
        Ok(entries) => Json(entries).into_response(),
        Err(err) => {
            tracing::error!("Failed to read search history: {:#}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn get_logs(State(buffer): State<LogBuffer>, Query(query): Query<LimitQuery>) -> Response {
    let limit = query.resolve(DEFAULT_LOGS_LIMIT, MAX_LOGS_LIMIT);
    Json(buffer.recent(limit)).into_response()
}

async fn get_settings(State(config): State<GuardedAppConfig>) -> impl IntoResponse {
    Json(SettingsView::from(&*config.read().await))
}

async fn put_settings(
    State(state): State<ServerState>,
    Json(update): Json<SettingsUpdate>,
) -> Response {
    match apply_settings(&state, update).await {
        Ok(view) => Json(view).into_response(),
        Err(err) if err.is_client_error() => {
            tracing::warn!("Settings rejected, config file unchanged: {}", err);
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
        Err(err) => {
            tracing::error!("{}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

pub fn make_app(state: ServerState) -> Router {
    let api_routes: Router = Router::new()
        .route("/status", get(get_all_status))
        .route("/status/{app_name}", get(get_source_status))
        .route("/search-now/{app_name}", post(search_now))
        .route("/history", get(get_history))
        .route("/logs", get(get_logs))
        .route("/settings", get(get_settings).put(put_settings))
        .with_state(state.clone());

    let home_router: Router = match &state.config.frontend_dir_path {
        Some(frontend_path) => {
            info!("Serving frontend from {}", frontend_path);
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    home_router
        .route("/health", get(health))
        .nest("/api", api_routes)
        .layer(middleware::from_fn(check_origin))
        .layer(middleware::from_fn_with_state(state, log_requests))
}

pub async fn run_server(state: ServerState) -> Result<()> {
    let address = format!("{}:{}", state.config.bind_address, state.config.port);
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Ready to serve at {}!", address);

    Ok(axum::serve(listener, app).await?)
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics::metrics_handler))
}

pub async fn run_metrics_server(bind_address: &str, port: u16) -> Result<()> {
    let address = format!("{}:{}", bind_address, port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind metrics server on {}", address))?;
    info!("Metrics available at {}!", address);

    Ok(axum::serve(listener, make_metrics_app()).await?)
}
