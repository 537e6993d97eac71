//! `SQLite` schema definitions for blackbox.
//!
//! The record store is a plain key-value table partitioned by store name.
//! Values are JSON documents.

/// SQL statement to create the key-value entries table.
pub const CREATE_ENTRIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS entries (
    store TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (store, key)
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// Insert or replace one entry.
pub const UPSERT_ENTRY: &str = r"
INSERT INTO entries (store, key, value, updated_at)
VALUES (?1, ?2, ?3, datetime('now'))
ON CONFLICT (store, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
";

/// Read one entry.
pub const SELECT_ENTRY: &str = "SELECT value FROM entries WHERE store = ?1 AND key = ?2";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[CREATE_ENTRIES_TABLE, CREATE_METADATA_TABLE];
