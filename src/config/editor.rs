//! Edits submitted through the settings API, merged onto the config file.

use serde::Deserialize;
use thiserror::Error;

use super::file_config::{ArrConfig, FileConfig};
use super::validation::{clamp_setting, safe_log_level, validate_arr_url};
use super::SourceSettings;
use crate::search::SourceKind;

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("{app}: {reason}")]
    InvalidUrl {
        app: &'static str,
        reason: &'static str,
    },

    #[error("{0}: cannot be enabled without a url")]
    MissingUrl(&'static str),

    #[error("Invalid settings: {0}")]
    Rejected(String),

    #[error("Failed to save settings: {0}")]
    Storage(String),
}

impl SettingsError {
    /// Whether the request itself was at fault, as opposed to the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, SettingsError::Storage(_))
    }
}

/// Body of `PUT /api/settings`. Every field is optional; absent fields keep
/// their current value.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsUpdate {
    pub log_level: Option<String>,
    pub hard_max_per_cycle: Option<i64>,
    pub radarr: Option<SourceUpdate>,
    pub sonarr: Option<SourceUpdate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceUpdate {
    pub url: Option<String>,
    /// A blank key keeps the stored one.
    pub api_key: Option<String>,
    pub enabled: Option<bool>,
    pub search_interval: Option<i64>,
    pub search_missing_count: Option<i64>,
    pub search_cutoff_count: Option<i64>,
}

impl SettingsUpdate {
    /// Applies the edit to `file`. Numbers are clamped into their allowed
    /// ranges and the log level is normalized; a bad URL rejects the whole
    /// edit. Server settings in `[general]` are carried over untouched.
    pub fn apply_to(self, mut file: FileConfig) -> Result<FileConfig, SettingsError> {
        let mut general = file.general.take().unwrap_or_default();
        if let Some(level) = self.log_level {
            general.log_level = Some(safe_log_level(Some(&level)).to_string());
        }
        if let Some(hard_max) = self.hard_max_per_cycle {
            general.hard_max_per_cycle = Some(clamp_setting(Some(hard_max), 0, 0, 1000).0);
        }
        file.general = Some(general);

        if let Some(update) = self.radarr {
            file.radarr = Some(update.apply_to(SourceKind::Radarr, file.radarr.take())?);
        }
        if let Some(update) = self.sonarr {
            file.sonarr = Some(update.apply_to(SourceKind::Sonarr, file.sonarr.take())?);
        }
        Ok(file)
    }
}

impl SourceUpdate {
    fn apply_to(self, kind: SourceKind, current: Option<ArrConfig>) -> Result<ArrConfig, SettingsError> {
        let app = kind.display_name();
        let defaults = SourceSettings::default();
        let mut arr = current.unwrap_or_default();

        if let Some(url) = self.url {
            let url = url.trim().to_string();
            validate_arr_url(&url).map_err(|reason| SettingsError::InvalidUrl { app, reason })?;
            arr.url = Some(url);
        }
        if let Some(key) = self.api_key.map(|k| k.trim().to_string()) {
            if !key.is_empty() {
                arr.api_key = Some(key);
            }
        }
        if let Some(enabled) = self.enabled {
            arr.enabled = Some(enabled);
        }

        let clamp = |value: Option<i64>, default: usize, min: i64, max: i64| {
            value.map(|v| clamp_setting(Some(v), default as i64, min, max).0)
        };
        if let Some(interval) = clamp(
            self.search_interval,
            defaults.search_interval_minutes as usize,
            1,
            1440,
        ) {
            arr.search_interval = Some(interval);
        }
        if let Some(count) = clamp(self.search_missing_count, defaults.search_missing_count, 0, 100) {
            arr.search_missing_count = Some(count);
        }
        if let Some(count) = clamp(self.search_cutoff_count, defaults.search_cutoff_count, 0, 100) {
            arr.search_cutoff_count = Some(count);
        }

        let url = arr.url.as_deref().unwrap_or_default().trim();
        if arr.enabled.unwrap_or(false) && url.is_empty() {
            return Err(SettingsError::MissingUrl(app));
        }
        Ok(arr)
    }
}
