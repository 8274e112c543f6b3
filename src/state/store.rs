use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use super::models::{SourceState, StateFile, STATE_FILE_VERSION};
use crate::history::LegacyHistoryEntry;
use crate::search::SourceKind;

/// Durable per-source cursor state.
pub trait StateStore: Send + Sync {
    /// Defaults when nothing was ever saved for `source`.
    fn load(&self, source: SourceKind) -> SourceState;

    /// Must leave either the old or the new state on disk, never a mix.
    fn save(&self, source: SourceKind, state: &SourceState) -> Result<()>;
}

/// Single JSON file holding both sources, rewritten atomically on each save.
pub struct JsonFileStateStore {
    path: PathBuf,
    file: Mutex<StateFile>,
    legacy_search_log: Mutex<Vec<LegacyHistoryEntry>>,
}

impl JsonFileStateStore {
    /// Loads `path`, migrating older layouts. A missing or unreadable file
    /// starts from defaults.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (file, legacy) = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Value>(&content) {
                Ok(raw) => migrate(&raw),
                Err(e) => {
                    warn!(
                        "State file {:?} is corrupt ({}), starting from defaults",
                        path, e
                    );
                    (StateFile::default(), Vec::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No state file at {:?}, starting from defaults", path);
                (StateFile::default(), Vec::new())
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read state file {:?}", path))
            }
        };

        Ok(Self {
            path,
            file: Mutex::new(file),
            legacy_search_log: Mutex::new(legacy),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hands over the inline search log found in an older state file.
    /// Subsequent calls return nothing.
    pub fn take_legacy_search_log(&self) -> Vec<LegacyHistoryEntry> {
        std::mem::take(&mut *self.legacy_search_log.lock().unwrap())
    }

    /// Rewrites the file in the current layout.
    pub fn flush(&self) -> Result<()> {
        let file = self.file.lock().unwrap();
        write_atomically(&self.path, &file)
    }

    pub fn snapshot(&self) -> StateFile {
        self.file.lock().unwrap().clone()
    }
}

impl StateStore for JsonFileStateStore {
    fn load(&self, source: SourceKind) -> SourceState {
        self.file.lock().unwrap().source(source).clone()
    }

    fn save(&self, source: SourceKind, state: &SourceState) -> Result<()> {
        let mut file = self.file.lock().unwrap();
        *file.source_mut(source) = state.clone();
        write_atomically(&self.path, &file)
    }
}

fn write_atomically(path: &Path, file: &StateFile) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create state directory {:?}", parent))?;

    let mut tmp = tempfile::Builder::new()
        .suffix(".tmp")
        .tempfile_in(parent)
        .context("Failed to create temporary state file")?;
    serde_json::to_writer_pretty(&mut tmp, file)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .with_context(|| format!("Failed to replace state file {:?}", path))?;
    Ok(())
}

// =============================================================================
// Migration
// =============================================================================

/// Builds the current layout from any known older one. Every field is read
/// individually and falls back to its default when absent or mistyped.
///
/// Version 1 had no `version` key and carried a `search_log` array, which now
/// lives in the history database.
fn migrate(raw: &Value) -> (StateFile, Vec<LegacyHistoryEntry>) {
    let version = raw
        .get("version")
        .and_then(Value::as_u64)
        .unwrap_or(1) as u32;
    if version > STATE_FILE_VERSION {
        warn!(
            "State file version {} is newer than supported {}, reading known fields only",
            version, STATE_FILE_VERSION
        );
    }

    let file = StateFile {
        version: STATE_FILE_VERSION,
        radarr: raw.get("radarr").map(read_source_state).unwrap_or_default(),
        sonarr: raw.get("sonarr").map(read_source_state).unwrap_or_default(),
    };

    let legacy = if version < 2 {
        raw.get("search_log")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| serde_json::from_value(e.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    (file, legacy)
}

fn read_source_state(raw: &Value) -> SourceState {
    let usize_field = |key: &str| raw.get(key).and_then(Value::as_u64).map(|v| v as usize);
    let time_field = |key: &str| {
        raw.get(key)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    };

    SourceState {
        missing_cursor: usize_field("missing_cursor").unwrap_or(0),
        cutoff_cursor: usize_field("cutoff_cursor").unwrap_or(0),
        last_run: time_field("last_run"),
        connected: raw.get("connected").and_then(Value::as_bool),
        unreachable_since: time_field("unreachable_since"),
        missing_count: usize_field("missing_count"),
        cutoff_count: usize_field("cutoff_count"),
    }
}
