//! Database schema for the search history database.

use anyhow::Result;
use rusqlite::Connection;

use crate::sqlite_column;
use crate::sqlite_persistence::{column_exists, SqlType, Table, VersionedSchema};

// =============================================================================
// Version 0 - attempts without outcome
// =============================================================================

const SEARCH_HISTORY_TABLE_V0: Table = Table {
    name: "search_history",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("timestamp", &SqlType::Text, non_null = true),
        sqlite_column!("app", &SqlType::Text, non_null = true),
        sqlite_column!("queue_type", &SqlType::Text, non_null = true),
        sqlite_column!("item_name", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_search_history_timestamp", "timestamp DESC")],
};

// =============================================================================
// Version 1 - outcome and detail
// =============================================================================

const SEARCH_HISTORY_TABLE_V1: Table = Table {
    name: "search_history",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("timestamp", &SqlType::Text, non_null = true),
        sqlite_column!("app", &SqlType::Text, non_null = true),
        sqlite_column!("queue_type", &SqlType::Text, non_null = true),
        sqlite_column!("item_name", &SqlType::Text, non_null = true),
        sqlite_column!("outcome", &SqlType::Text),
        sqlite_column!("detail", &SqlType::Text),
    ],
    indices: &[("idx_search_history_timestamp", "timestamp DESC")],
};

/// Unversioned databases may already have either column.
fn migrate_v0_to_v1(conn: &Connection) -> Result<()> {
    for column in ["outcome", "detail"] {
        if !column_exists(conn, "search_history", column)? {
            conn.execute(
                &format!("ALTER TABLE search_history ADD COLUMN {} TEXT", column),
                [],
            )?;
        }
    }
    Ok(())
}

pub const SEARCH_HISTORY_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[SEARCH_HISTORY_TABLE_V0],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[SEARCH_HISTORY_TABLE_V1],
        migration: Some(migrate_v0_to_v1),
    },
];
