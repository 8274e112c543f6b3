use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Commented template written when no config file exists yet.
pub const DEFAULT_CONFIG: &str = r#"# Fetcharr Configuration
# Edit this file and restart Fetcharr.

[general]
# Log level: debug, info, warning, error
log_level = "info"
# Combined cap on searches per app per cycle, split between the missing and
# cutoff queues. 0 = unlimited.
# hard_max_per_cycle = 0
# port = 8080
# metrics_port = 9091

[radarr]
# Radarr connection settings
url = ""           # e.g. "http://radarr:7878"
api_key = ""       # From Radarr > Settings > General > API Key
enabled = false
# search_interval = 30       # Minutes between search cycles
# search_missing_count = 5   # Missing items to search per cycle
# search_cutoff_count = 5    # Cutoff items to search per cycle

[sonarr]
# Sonarr connection settings
url = ""           # e.g. "http://sonarr:8989"
api_key = ""       # From Sonarr > Settings > General > API Key
enabled = false
# search_interval = 30       # Minutes between search cycles
# search_missing_count = 5   # Missing items to search per cycle
# search_cutoff_count = 5    # Cutoff items to search per cycle
"#;

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
#[serde(default)]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub general: Option<GeneralConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radarr: Option<ArrConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sonarr: Option<ArrConfig>,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
#[serde(default)]
pub struct GeneralConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hard_max_per_cycle: Option<i64>,

    // Server settings (can override CLI)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontend_dir_path: Option<String>,
}

/// Connection and tuning for one Radarr/Sonarr instance.
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
#[serde(default)]
pub struct ArrConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Minutes between cycles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_interval: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_missing_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_cutoff_count: Option<i64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Writes [`DEFAULT_CONFIG`] to `path`, creating parent directories.
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }
        std::fs::write(path, DEFAULT_CONFIG)
            .with_context(|| format!("Failed to write default config: {:?}", path))
    }

    /// Replaces the file at `path` atomically. The file holds API keys, so it
    /// is only readable by its owner.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::Builder::new()
            .suffix(".tmp")
            .tempfile_in(parent)
            .context("Failed to create temporary config file")?;
        tmp.write_all(content.as_bytes())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path)
            .with_context(|| format!("Failed to replace config file {:?}", path))?;
        Ok(())
    }
}
