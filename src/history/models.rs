use serde::{Deserialize, Serialize};

use crate::search::{QueueKind, SourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchOutcome {
    Searched,
    Failed,
}

impl SearchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchOutcome::Searched => "searched",
            SearchOutcome::Failed => "failed",
        }
    }

    /// Rows written before outcomes were tracked have no value and were
    /// all successful searches.
    pub fn from_db(value: Option<&str>) -> Self {
        match value {
            Some("failed") => SearchOutcome::Failed,
            _ => SearchOutcome::Searched,
        }
    }
}

/// One search attempt, as emitted by a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSearchAttempt {
    pub source: SourceKind,
    pub queue: QueueKind,
    pub item_name: String,
    pub outcome: SearchOutcome,
    pub detail: String,
}

impl NewSearchAttempt {
    pub fn searched(source: SourceKind, queue: QueueKind, item_name: &str) -> Self {
        Self {
            source,
            queue,
            item_name: item_name.to_string(),
            outcome: SearchOutcome::Searched,
            detail: String::new(),
        }
    }

    pub fn failed(source: SourceKind, queue: QueueKind, item_name: &str, detail: String) -> Self {
        Self {
            source,
            queue,
            item_name: item_name.to_string(),
            outcome: SearchOutcome::Failed,
            detail,
        }
    }
}

/// A stored history row. `app` and `queue_type` stay strings because
/// imported legacy rows may carry values we no longer produce.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchAttempt {
    pub id: i64,
    pub timestamp: String,
    pub app: String,
    pub queue_type: String,
    #[serde(rename = "name")]
    pub item_name: String,
    pub outcome: SearchOutcome,
    pub detail: String,
}

/// Entry of the search log that older state files carried inline.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LegacyHistoryEntry {
    pub name: String,
    pub timestamp: String,
    pub app: String,
    pub queue_type: String,
}
