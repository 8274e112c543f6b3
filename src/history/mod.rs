//! Durable log of search attempts, backed by SQLite.

pub mod models;
mod schema;
mod store;

pub use models::{LegacyHistoryEntry, NewSearchAttempt, SearchAttempt, SearchOutcome};
pub use store::{SearchHistoryStore, SqliteSearchHistoryStore, MAX_HISTORY_ROWS};
