mod editor;
mod file_config;
pub mod validation;

pub use editor::{SettingsError, SettingsUpdate, SourceUpdate};
pub use file_config::{ArrConfig, FileConfig, GeneralConfig, DEFAULT_CONFIG};

use crate::search::{CycleLimits, SourceKind};
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;
use validation::{clamp_setting, safe_log_level, validate_arr_url};

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub bind_address: String,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/config"),
            port: 8080,
            metrics_port: 9091,
            bind_address: "0.0.0.0".to_string(),
            logging_level: RequestsLoggingLevel::Path,
            frontend_dir_path: None,
        }
    }
}

/// The running server's values, used as fallbacks when re-resolving an
/// edited config file.
impl From<&AppConfig> for CliConfig {
    fn from(config: &AppConfig) -> Self {
        CliConfig {
            data_dir: config.data_dir.clone(),
            port: config.port,
            metrics_port: config.metrics_port,
            bind_address: config.bind_address.clone(),
            logging_level: config.logging_level.clone(),
            frontend_dir_path: config.frontend_dir_path.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub data_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub bind_address: String,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,

    /// One of `debug`, `info`, `warning`, `error`.
    pub log_level: String,
    /// Combined per-cycle search cap per source, 0 = unlimited.
    pub hard_max_per_cycle: usize,

    pub radarr: SourceSettings,
    pub sonarr: SourceSettings,

    /// Adjustments made while resolving, logged once logging is up.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    pub enabled: bool,
    pub url: String,
    pub api_key: String,
    pub search_interval_minutes: u64,
    pub search_missing_count: usize,
    pub search_cutoff_count: usize,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            api_key: String::new(),
            search_interval_minutes: 30,
            search_missing_count: 5,
            search_cutoff_count: 5,
        }
    }
}

impl SourceSettings {
    /// Enabled and pointing somewhere.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.url.trim().is_empty()
    }

    fn resolve(kind: SourceKind, file: Option<ArrConfig>, warnings: &mut Vec<String>) -> Result<Self> {
        let file = file.unwrap_or_default();
        let defaults = SourceSettings::default();
        let name = kind.display_name();

        let url = file.url.unwrap_or_default().trim().to_string();
        let enabled = file.enabled.unwrap_or(false);
        if enabled {
            if url.is_empty() {
                warnings.push(format!("{}: enabled but no url configured, skipping", name));
            } else if let Err(reason) = validate_arr_url(&url) {
                bail!("{}: invalid url '{}': {}", name, url, reason);
            }
        }

        let mut clamp = |field: &str, value: Option<i64>, default: usize, min: i64, max: i64| {
            let (resolved, changed) = clamp_setting(value, default as i64, min, max);
            if changed {
                warnings.push(format!(
                    "{}: {} {} out of range, using {}",
                    name,
                    field,
                    value.unwrap_or_default(),
                    resolved
                ));
            }
            resolved as usize
        };

        let search_interval_minutes = clamp(
            "search_interval",
            file.search_interval,
            defaults.search_interval_minutes as usize,
            1,
            1440,
        ) as u64;
        let search_missing_count = clamp(
            "search_missing_count",
            file.search_missing_count,
            defaults.search_missing_count,
            0,
            100,
        );
        let search_cutoff_count = clamp(
            "search_cutoff_count",
            file.search_cutoff_count,
            defaults.search_cutoff_count,
            0,
            100,
        );

        Ok(Self {
            enabled,
            url,
            api_key: file.api_key.unwrap_or_default().trim().to_string(),
            search_interval_minutes,
            search_missing_count,
            search_cutoff_count,
        })
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();
        let general = file.general.unwrap_or_default();
        let mut warnings = Vec::new();

        let data_dir = general
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.data_dir.clone());
        if data_dir.exists() && !data_dir.is_dir() {
            bail!("data_dir is not a directory: {:?}", data_dir);
        }

        let port = general.port.unwrap_or(cli.port);
        let metrics_port = general.metrics_port.unwrap_or(cli.metrics_port);
        let bind_address = general
            .bind_address
            .unwrap_or_else(|| cli.bind_address.clone());
        let logging_level = general
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());
        let frontend_dir_path = general
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        let log_level = safe_log_level(general.log_level.as_deref()).to_string();
        if let Some(raw) = &general.log_level {
            if raw.trim().to_lowercase() != log_level {
                warnings.push(format!("Unknown log_level '{}', using '{}'", raw, log_level));
            }
        }

        let (hard_max, changed) = clamp_setting(general.hard_max_per_cycle, 0, 0, 1000);
        if changed {
            warnings.push(format!(
                "hard_max_per_cycle {} out of range, using {}",
                general.hard_max_per_cycle.unwrap_or_default(),
                hard_max
            ));
        }

        let radarr = SourceSettings::resolve(SourceKind::Radarr, file.radarr, &mut warnings)?;
        let sonarr = SourceSettings::resolve(SourceKind::Sonarr, file.sonarr, &mut warnings)?;

        Ok(Self {
            data_dir,
            port,
            metrics_port,
            bind_address,
            logging_level,
            frontend_dir_path,
            log_level,
            hard_max_per_cycle: hard_max as usize,
            radarr,
            sonarr,
            warnings,
        })
    }

    pub fn source(&self, kind: SourceKind) -> &SourceSettings {
        match kind {
            SourceKind::Radarr => &self.radarr,
            SourceKind::Sonarr => &self.sonarr,
        }
    }

    pub fn has_enabled_app(&self) -> bool {
        SourceKind::ALL.iter().any(|k| self.source(*k).is_active())
    }

    pub fn active_sources(&self) -> Vec<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|k| self.source(*k).is_active())
            .collect()
    }

    pub fn cycle_limits(&self, kind: SourceKind) -> CycleLimits {
        let source = self.source(kind);
        CycleLimits {
            missing: source.search_missing_count,
            cutoff: source.search_cutoff_count,
            hard_max: self.hard_max_per_cycle,
        }
    }

    pub fn search_interval(&self, kind: SourceKind) -> Duration {
        Duration::from_secs(self.source(kind).search_interval_minutes * 60)
    }

    /// Non-empty API keys, for log redaction.
    pub fn secrets(&self) -> Vec<String> {
        [&self.radarr.api_key, &self.sonarr.api_key]
            .into_iter()
            .filter(|k| !k.is_empty())
            .cloned()
            .collect()
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }

    pub fn history_db_path(&self) -> PathBuf {
        self.data_dir.join("fetcharr.db")
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arr(url: &str, enabled: bool) -> ArrConfig {
        ArrConfig {
            url: Some(url.to_string()),
            api_key: Some("secret-key".to_string()),
            enabled: Some(enabled),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_logging_level() {
        assert!(matches!(
            parse_logging_level("none"),
            Some(RequestsLoggingLevel::None)
        ));
        assert!(matches!(
            parse_logging_level("HEADERS"),
            Some(RequestsLoggingLevel::Headers)
        ));
        assert!(parse_logging_level("invalid").is_none());
    }

    #[test]
    fn test_resolve_cli_only() {
        let cli = CliConfig {
            data_dir: PathBuf::from("/data"),
            port: 8181,
            metrics_port: 9191,
            bind_address: "127.0.0.1".to_string(),
            logging_level: RequestsLoggingLevel::Headers,
            frontend_dir_path: Some("/frontend".to_string()),
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.port, 8181);
        assert_eq!(config.metrics_port, 9191);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.logging_level, RequestsLoggingLevel::Headers);
        assert_eq!(config.frontend_dir_path, Some("/frontend".to_string()));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.hard_max_per_cycle, 0);
        assert_eq!(config.radarr, SourceSettings::default());
        assert!(!config.has_enabled_app());
        assert!(config.warnings.is_empty());
        assert_eq!(config.state_path(), PathBuf::from("/data/state.json"));
        assert_eq!(config.history_db_path(), PathBuf::from("/data/fetcharr.db"));
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let cli = CliConfig::default();
        let file = FileConfig {
            general: Some(GeneralConfig {
                log_level: Some("debug".to_string()),
                hard_max_per_cycle: Some(6),
                port: Some(4000),
                logging_level: Some("none".to_string()),
                data_dir: Some("/srv/fetcharr".to_string()),
                ..Default::default()
            }),
            radarr: Some(ArrConfig {
                search_interval: Some(15),
                search_missing_count: Some(8),
                search_cutoff_count: Some(2),
                ..arr("http://radarr:7878/", true)
            }),
            sonarr: None,
        };

        let config = AppConfig::resolve(&cli, Some(file)).unwrap();

        assert_eq!(config.port, 4000);
        assert_eq!(config.metrics_port, 9091);
        assert_eq!(config.data_dir, PathBuf::from("/srv/fetcharr"));
        assert_eq!(config.logging_level, RequestsLoggingLevel::None);
        assert_eq!(config.log_level, "debug");
        assert!(config.radarr.is_active());
        assert!(!config.sonarr.is_active());
        assert_eq!(config.active_sources(), vec![SourceKind::Radarr]);
        assert_eq!(config.search_interval(SourceKind::Radarr), Duration::from_secs(900));
        assert_eq!(
            config.cycle_limits(SourceKind::Radarr),
            CycleLimits {
                missing: 8,
                cutoff: 2,
                hard_max: 6
            }
        );
        assert_eq!(config.secrets(), vec!["secret-key".to_string()]);
    }

    #[test]
    fn test_resolve_rejects_invalid_url_for_enabled_app() {
        let file = FileConfig {
            sonarr: Some(arr("ftp://sonarr:8989", true)),
            ..Default::default()
        };

        let err = AppConfig::resolve(&CliConfig::default(), Some(file)).unwrap_err();

        assert!(err.to_string().contains("Sonarr: invalid url"));
    }

    #[test]
    fn test_resolve_ignores_invalid_url_for_disabled_app() {
        let file = FileConfig {
            sonarr: Some(arr("ftp://sonarr:8989", false)),
            ..Default::default()
        };

        let config = AppConfig::resolve(&CliConfig::default(), Some(file)).unwrap();

        assert!(!config.sonarr.is_active());
    }

    #[test]
    fn test_resolve_clamps_and_warns() {
        let file = FileConfig {
            general: Some(GeneralConfig {
                log_level: Some("chatty".to_string()),
                hard_max_per_cycle: Some(-1),
                ..Default::default()
            }),
            radarr: Some(ArrConfig {
                search_interval: Some(0),
                search_missing_count: Some(500),
                ..arr("http://radarr:7878", true)
            }),
            sonarr: Some(arr("", true)),
        };

        let config = AppConfig::resolve(&CliConfig::default(), Some(file)).unwrap();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.hard_max_per_cycle, 0);
        assert_eq!(config.radarr.search_interval_minutes, 1);
        assert_eq!(config.radarr.search_missing_count, 100);
        assert_eq!(config.radarr.search_cutoff_count, 5);
        assert!(!config.sonarr.is_active());
        assert_eq!(config.warnings.len(), 5);
        assert!(config
            .warnings
            .iter()
            .any(|w| w.contains("Sonarr: enabled but no url")));
    }

    #[test]
    fn test_resolve_data_dir_not_directory_error() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let cli = CliConfig {
            data_dir: temp_file.path().to_path_buf(),
            ..Default::default()
        };

        let result = AppConfig::resolve(&cli, None);

        assert!(result.unwrap_err().to_string().contains("not a directory"));
    }

    #[test]
    fn test_running_config_round_trips_as_cli_fallback() {
        let cli = CliConfig {
            data_dir: PathBuf::from("/data"),
            port: 8181,
            bind_address: "127.0.0.1".to_string(),
            ..Default::default()
        };
        let running = AppConfig::resolve(&cli, None).unwrap();

        let again = AppConfig::resolve(&CliConfig::from(&running), None).unwrap();

        assert_eq!(again.data_dir, PathBuf::from("/data"));
        assert_eq!(again.port, 8181);
        assert_eq!(again.bind_address, "127.0.0.1");
        assert_eq!(again.metrics_port, running.metrics_port);
    }
}
