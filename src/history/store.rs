use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection};

use super::models::{LegacyHistoryEntry, NewSearchAttempt, SearchAttempt, SearchOutcome};
use super::schema::SEARCH_HISTORY_VERSIONED_SCHEMAS;
use crate::sqlite_persistence::{open_in_memory, open_versioned};

/// Rows kept after every insert.
pub const MAX_HISTORY_ROWS: usize = 500;

/// Append-only log of search attempts.
pub trait SearchHistoryStore: Send + Sync {
    /// Appends one attempt, then prunes to the newest [`MAX_HISTORY_ROWS`].
    fn record(&self, attempt: &NewSearchAttempt) -> Result<()>;

    /// Newest first.
    fn recent(&self, limit: usize) -> Result<Vec<SearchAttempt>>;

    fn count(&self) -> Result<usize>;

    /// Bulk-inserts entries carried over from an older state file, skipping
    /// any that are already present. Returns how many rows were written.
    fn import_legacy(&self, entries: &[LegacyHistoryEntry]) -> Result<usize>;
}

pub struct SqliteSearchHistoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSearchHistoryStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned(db_path, SEARCH_HISTORY_VERSIONED_SCHEMAS, "search history")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = open_in_memory(SEARCH_HISTORY_VERSIONED_SCHEMAS)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn now_timestamp() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn prune(conn: &Connection) -> Result<usize> {
        let deleted = conn.execute(
            "DELETE FROM search_history WHERE id NOT IN (
                SELECT id FROM search_history ORDER BY id DESC LIMIT ?1
            )",
            params![MAX_HISTORY_ROWS as i64],
        )?;
        Ok(deleted)
    }
}

impl SearchHistoryStore for SqliteSearchHistoryStore {
    fn record(&self, attempt: &NewSearchAttempt) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO search_history (timestamp, app, queue_type, item_name, outcome, detail)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Self::now_timestamp(),
                attempt.source.display_name(),
                attempt.queue.as_str(),
                attempt.item_name,
                attempt.outcome.as_str(),
                attempt.detail,
            ],
        )
        .context("Failed to insert search history entry")?;
        Self::prune(&conn)?;
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<SearchAttempt>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, app, queue_type, item_name, outcome, detail
             FROM search_history ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(SearchAttempt {
                    id: row.get("id")?,
                    timestamp: row.get("timestamp")?,
                    app: row.get("app")?,
                    queue_type: row.get("queue_type")?,
                    item_name: row.get("item_name")?,
                    outcome: SearchOutcome::from_db(
                        row.get::<_, Option<String>>("outcome")?.as_deref(),
                    ),
                    detail: row.get::<_, Option<String>>("detail")?.unwrap_or_default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM search_history", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn import_legacy(&self, entries: &[LegacyHistoryEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            // Rows already carried over by an earlier, interrupted start are skipped.
            let mut stmt = tx.prepare(
                "INSERT INTO search_history (timestamp, app, queue_type, item_name)
                 SELECT ?1, ?2, ?3, ?4
                 WHERE NOT EXISTS (
                     SELECT 1 FROM search_history
                     WHERE timestamp = ?1 AND app = ?2 AND queue_type = ?3 AND item_name = ?4
                 )",
            )?;
            for entry in entries {
                inserted += stmt.execute(params![
                    entry.timestamp,
                    entry.app,
                    entry.queue_type,
                    entry.name
                ])?;
            }
        }
        Self::prune(&tx)?;
        tx.commit()?;
        Ok(inserted)
    }
}
