use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::search::{QueueKind, SourceKind};

/// Current layout of the state file.
pub const STATE_FILE_VERSION: u32 = 2;

/// Cursor and health bookkeeping for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceState {
    pub missing_cursor: usize,
    pub cutoff_cursor: usize,
    pub last_run: Option<DateTime<Utc>>,
    /// `None` until the first fetch attempt.
    pub connected: Option<bool>,
    pub unreachable_since: Option<DateTime<Utc>>,
    /// Raw candidate counts from the last successful fetch, before filtering.
    pub missing_count: Option<usize>,
    pub cutoff_count: Option<usize>,
}

impl SourceState {
    pub fn cursor(&self, queue: QueueKind) -> usize {
        match queue {
            QueueKind::Missing => self.missing_cursor,
            QueueKind::Cutoff => self.cutoff_cursor,
        }
    }

    pub fn set_cursor(&mut self, queue: QueueKind, cursor: usize) {
        match queue {
            QueueKind::Missing => self.missing_cursor = cursor,
            QueueKind::Cutoff => self.cutoff_cursor = cursor,
        }
    }

    /// Keeps the first failure time across consecutive failures.
    pub fn mark_unreachable(&mut self, now: DateTime<Utc>) {
        self.connected = Some(false);
        if self.unreachable_since.is_none() {
            self.unreachable_since = Some(now);
        }
    }

    pub fn mark_connected(&mut self, missing_count: usize, cutoff_count: usize) {
        self.connected = Some(true);
        self.unreachable_since = None;
        self.missing_count = Some(missing_count);
        self.cutoff_count = Some(cutoff_count);
    }
}

/// Everything persisted in `state.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    pub radarr: SourceState,
    pub sonarr: SourceState,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_FILE_VERSION,
            radarr: SourceState::default(),
            sonarr: SourceState::default(),
        }
    }
}

impl StateFile {
    pub fn source(&self, source: SourceKind) -> &SourceState {
        match source {
            SourceKind::Radarr => &self.radarr,
            SourceKind::Sonarr => &self.sonarr,
        }
    }

    pub fn source_mut(&mut self, source: SourceKind) -> &mut SourceState {
        match source {
            SourceKind::Radarr => &mut self.radarr,
            SourceKind::Sonarr => &mut self.sonarr,
        }
    }
}
