use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: u32 = 1;

pub fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        ",
    )?;
    Ok(())
}

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS items (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            key             TEXT UNIQUE NOT NULL,
            item_type       TEXT NOT NULL,
            parent_id       INTEGER REFERENCES items(id) ON DELETE CASCADE,
            title           TEXT NOT NULL DEFAULT '',
            file_path       TEXT,
            content_type    TEXT,
            creators        TEXT NOT NULL DEFAULT '[]',
            fields          TEXT NOT NULL DEFAULT '{}',
            library_catalog TEXT,
            date_added      TEXT NOT NULL,
            date_modified   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS collections (
            id   INTEGER PRIMARY KEY AUTOINCREMENT,
            key  TEXT UNIQUE NOT NULL,
            name TEXT UNIQUE NOT NULL
        );

        CREATE TABLE IF NOT EXISTS collection_items (
            collection_id INTEGER NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
            item_id       INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
            added_at      TEXT NOT NULL,
            PRIMARY KEY (collection_id, item_id)
        );
        ",
    )?;
    Ok(())
}

pub fn create_indexes(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_items_parent    ON items(parent_id);
        CREATE INDEX IF NOT EXISTS idx_items_type      ON items(item_type);
        CREATE INDEX IF NOT EXISTS idx_collection_item ON collection_items(item_id);
        ",
    )?;
    Ok(())
}
