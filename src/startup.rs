//! One-shot startup chores: banner, configuration sanity warnings and
//! connection checks. Nothing here is fatal.

use std::collections::BTreeMap;

use reqwest::Url;
use tracing::{info, warn};

use crate::arr::{RadarrClient, SonarrClient};
use crate::config::AppConfig;
use crate::search::SourceKind;

const LOCALHOST_PATTERNS: &[&str] = &["localhost", "127.0.0.1", "::1"];
const SEPARATOR: &str = "==================================================";

pub fn print_banner(config: &AppConfig) {
    let describe = |kind: SourceKind| {
        let source = config.source(kind);
        if source.enabled {
            source.url.clone()
        } else {
            "disabled".to_string()
        }
    };

    info!("{}", SEPARATOR);
    info!("Fetcharr v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", config.log_level);
    info!("Radarr: {}", describe(SourceKind::Radarr));
    info!("Sonarr: {}", describe(SourceKind::Sonarr));
    info!("{}", SEPARATOR);
}

/// Warning text for a source URL pointing at the local host, which inside a
/// container is the container itself.
pub fn localhost_warning(kind: SourceKind, url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.trim_start_matches('[').trim_end_matches(']');
    if !LOCALHOST_PATTERNS.contains(&host) {
        return None;
    }
    Some(format!(
        "{} URL ({}) uses localhost, which inside Docker refers to the container itself, \
         not your host machine. Use 'host.docker.internal' (Docker Desktop) or the \
         container/service name (e.g. 'http://{}:{}') instead.",
        kind,
        url,
        kind.as_str(),
        kind.default_port()
    ))
}

pub fn check_localhost_urls(config: &AppConfig) {
    for kind in config.active_sources() {
        if let Some(message) = localhost_warning(kind, &config.source(kind).url) {
            warn!("{}", message);
        }
    }
}

/// Logs the first-run hint. Returns whether any source is active.
pub fn check_enabled_apps(config: &AppConfig) -> bool {
    if config.has_enabled_app() {
        return true;
    }
    warn!(
        "No apps configured -- edit the config file in {} to add your Radarr/Sonarr connection",
        config.data_dir.display()
    );
    false
}

/// Checks each configured client once. Failures only produce warnings,
/// searches keep retrying on their own schedule.
pub async fn validate_connections(
    radarr: Option<&RadarrClient>,
    sonarr: Option<&SonarrClient>,
) -> BTreeMap<&'static str, bool> {
    let mut results = BTreeMap::new();

    if let Some(client) = radarr {
        results.insert(SourceKind::Radarr.display_name(), client.validate_connection().await);
    }

    if let Some(client) = sonarr {
        let connected = client.validate_connection().await;
        if connected {
            let api_version = client.detect_api_version().await;
            info!("Sonarr: Detected API {}", api_version);
        }
        results.insert(SourceKind::Sonarr.display_name(), connected);
    }

    for (app, connected) in &results {
        if *connected {
            info!("{}: Connection validated", app);
        } else {
            warn!("{}: Connection failed -- will retry during search", app);
        }
    }

    results
}
