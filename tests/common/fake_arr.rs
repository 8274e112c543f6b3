//! In-process stand-in for a Radarr or Sonarr instance.
//!
//! Serves the paginated `wanted/*` endpoints, the command endpoint and the
//! system status endpoint, records every command it receives and can be told
//! to fail requests.

use super::constants::*;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use fetcharr::arr::{ArrClient, RadarrClient, SonarrClient, DEFAULT_TIMEOUT};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Default)]
struct FakeArrState {
    missing: Vec<Value>,
    cutoff: Vec<Value>,
    version: String,
    /// Number of upcoming `wanted/*` requests answered with a 500.
    failing_fetches: usize,
    /// Number of upcoming command requests answered with a 500.
    failing_commands: usize,
    commands: Vec<Value>,
    wanted_requests: Vec<(String, u32, u32)>,
}

type SharedState = Arc<Mutex<FakeArrState>>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageQuery {
    page: Option<u32>,
    page_size: Option<u32>,
}

/// Handle on a running fake instance. The server stops when dropped.
pub struct FakeArr {
    pub base_url: String,
    state: SharedState,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

pub fn movie(id: i64, title: &str, monitored: bool) -> Value {
    json!({ "id": id, "title": title, "year": 2000 + id, "monitored": monitored })
}

pub fn episode(id: i64, series_id: i64, season: i64, series_title: &str, air_date: &str) -> Value {
    json!({
        "id": id,
        "seriesId": series_id,
        "seasonNumber": season,
        "episodeNumber": id,
        "airDateUtc": air_date,
        "monitored": true,
        "series": { "title": series_title }
    })
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("X-Api-Key")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|key| key == TEST_API_KEY)
}

fn paginate(
    state: &SharedState,
    headers: &HeaderMap,
    endpoint: &str,
    query: PageQuery,
    select: fn(&FakeArrState) -> &Vec<Value>,
) -> Response {
    if !authorized(headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut guard = state.lock().unwrap();
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(10).max(1);
    guard
        .wanted_requests
        .push((endpoint.to_string(), page, page_size));

    if guard.failing_fetches > 0 {
        guard.failing_fetches -= 1;
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let records = select(&*guard);
    let start = ((page - 1) * page_size) as usize;
    let page_records: Vec<Value> = records
        .iter()
        .skip(start)
        .take(page_size as usize)
        .cloned()
        .collect();

    Json(json!({
        "page": page,
        "pageSize": page_size,
        "sortKey": "id",
        "totalRecords": records.len(),
        "records": page_records,
    }))
    .into_response()
}

async fn wanted_missing(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Response {
    paginate(&state, &headers, "missing", query, |s| &s.missing)
}

async fn wanted_cutoff(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Response {
    paginate(&state, &headers, "cutoff", query, |s| &s.cutoff)
}

async fn command(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut guard = state.lock().unwrap();
    if guard.failing_commands > 0 {
        guard.failing_commands -= 1;
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    guard.commands.push(body.clone());
    (StatusCode::CREATED, Json(json!({ "id": guard.commands.len(), "name": body["name"] })))
        .into_response()
}

async fn system_status(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let version = state.lock().unwrap().version.clone();
    Json(json!({ "appName": "Fake", "version": version })).into_response()
}

impl FakeArr {
    /// Spawns an empty instance reporting version 4.0.0 on a random port.
    pub async fn spawn() -> Self {
        let state: SharedState = Arc::new(Mutex::new(FakeArrState {
            version: "4.0.0.0".to_string(),
            ..Default::default()
        }));

        let app = Router::new()
            .route("/api/v3/wanted/missing", get(wanted_missing))
            .route("/api/v3/wanted/cutoff", get(wanted_cutoff))
            .route("/api/v3/command", post(command))
            .route("/api/v3/system/status", get(system_status))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Fake arr server failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn set_missing(&self, records: Vec<Value>) {
        self.state.lock().unwrap().missing = records;
    }

    pub fn set_cutoff(&self, records: Vec<Value>) {
        self.state.lock().unwrap().cutoff = records;
    }

    pub fn set_version(&self, version: &str) {
        self.state.lock().unwrap().version = version.to_string();
    }

    pub fn fail_next_fetches(&self, count: usize) {
        self.state.lock().unwrap().failing_fetches = count;
    }

    pub fn fail_next_commands(&self, count: usize) {
        self.state.lock().unwrap().failing_commands = count;
    }

    /// Command bodies received so far, oldest first.
    pub fn commands(&self) -> Vec<Value> {
        self.state.lock().unwrap().commands.clone()
    }

    /// (endpoint, page, pageSize) of every `wanted/*` request, oldest first.
    pub fn wanted_requests(&self) -> Vec<(String, u32, u32)> {
        self.state.lock().unwrap().wanted_requests.clone()
    }

    fn arr_client(&self, app_name: &'static str, api_key: &str) -> ArrClient {
        ArrClient::new(app_name, &self.base_url, api_key, DEFAULT_TIMEOUT)
            .expect("Failed to build client")
            .with_retry_delay(Duration::from_millis(TEST_RETRY_DELAY_MS))
    }

    pub fn radarr_client(&self) -> RadarrClient {
        RadarrClient::from_client(self.arr_client("Radarr", TEST_API_KEY))
    }

    pub fn sonarr_client(&self) -> SonarrClient {
        SonarrClient::from_client(self.arr_client("Sonarr", TEST_API_KEY))
    }

    pub fn radarr_client_with_key(&self, api_key: &str) -> RadarrClient {
        RadarrClient::from_client(self.arr_client("Radarr", api_key))
    }
}

impl Drop for FakeArr {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
