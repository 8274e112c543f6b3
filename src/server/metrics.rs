use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

use crate::history::SearchOutcome;
use crate::search::{QueueKind, SourceKind};

/// Metric name prefix for all Fetcharr metrics
const PREFIX: &str = "fetcharr";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Search Cycle Metrics
    pub static ref SEARCH_CYCLES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_search_cycles_total"), "Search cycles by result"),
        &["source", "result"]
    ).expect("Failed to create search_cycles_total metric");

    pub static ref SEARCH_CYCLE_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_search_cycle_duration_seconds"),
            "Search cycle duration in seconds"
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["source"]
    ).expect("Failed to create search_cycle_duration_seconds metric");

    pub static ref SEARCHES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_searches_total"), "Search triggers by queue and outcome"),
        &["source", "queue", "outcome"]
    ).expect("Failed to create searches_total metric");

    pub static ref SEARCH_CANDIDATES: GaugeVec = GaugeVec::new(
        Opts::new(
            format!("{PREFIX}_search_candidates"),
            "Raw candidates returned by the last fetch"
        ),
        &["source", "queue"]
    ).expect("Failed to create search_candidates metric");

    pub static ref SOURCE_CONNECTED: GaugeVec = GaugeVec::new(
        Opts::new(
            format!("{PREFIX}_source_connected"),
            "Whether the last fetch from a source succeeded (1) or not (0)"
        ),
        &["source"]
    ).expect("Failed to create source_connected metric");

    // Background Job Metrics
    pub static ref BACKGROUND_JOB_RUNNING: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_background_job_running"), "Whether a background job is running"),
        &["job_id"]
    ).expect("Failed to create background_job_running metric");

    pub static ref BACKGROUND_JOB_EXECUTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            format!("{PREFIX}_background_job_executions_total"),
            "Background job executions by status"
        ),
        &["job_id", "status"]
    ).expect("Failed to create background_job_executions_total metric");

    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_background_job_duration_seconds"),
            "Background job duration in seconds"
        )
        .buckets(vec![0.1, 1.0, 10.0, 60.0, 300.0, 900.0]),
        &["job_id"]
    ).expect("Failed to create background_job_duration_seconds metric");

    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(SEARCH_CYCLES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SEARCH_CYCLE_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(SEARCHES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SEARCH_CANDIDATES.clone()));
    let _ = REGISTRY.register(Box::new(SOURCE_CONNECTED.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_RUNNING.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_EXECUTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(BACKGROUND_JOB_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

/// Record the end of a search cycle, `result` is `completed` or `aborted`.
pub fn record_cycle(source: SourceKind, result: &str, duration: Duration) {
    SEARCH_CYCLES_TOTAL
        .with_label_values(&[source.as_str(), result])
        .inc();

    SEARCH_CYCLE_DURATION_SECONDS
        .with_label_values(&[source.as_str()])
        .observe(duration.as_secs_f64());
}

pub fn record_search(source: SourceKind, queue: QueueKind, outcome: SearchOutcome) {
    SEARCHES_TOTAL
        .with_label_values(&[source.as_str(), queue.as_str(), outcome.as_str()])
        .inc();
}

pub fn set_candidates(source: SourceKind, queue: QueueKind, count: usize) {
    SEARCH_CANDIDATES
        .with_label_values(&[source.as_str(), queue.as_str()])
        .set(count as f64);
}

pub fn set_source_connected(source: SourceKind, connected: bool) {
    SOURCE_CONNECTED
        .with_label_values(&[source.as_str()])
        .set(if connected { 1.0 } else { 0.0 });
}

pub fn set_background_job_running(job_id: &str, running: bool) {
    BACKGROUND_JOB_RUNNING
        .with_label_values(&[job_id])
        .set(if running { 1.0 } else { 0.0 });
}

pub fn record_background_job_execution(job_id: &str, status: &str, duration: Duration) {
    BACKGROUND_JOB_EXECUTIONS_TOTAL
        .with_label_values(&[job_id, status])
        .inc();

    BACKGROUND_JOB_DURATION_SECONDS
        .with_label_values(&[job_id])
        .observe(duration.as_secs_f64());
}

/// Update process memory usage
pub fn update_memory_usage() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let rss_kb = status
                .lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<f64>().ok());
            if let Some(kb) = rss_kb {
                PROCESS_MEMORY_BYTES.set(kb * 1024.0);
            }
        }
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
