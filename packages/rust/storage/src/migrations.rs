//! SQL migration definitions for the WikiSync database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: sync_state, documents, images, sync_runs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per connector instance: the serialized sync cursor
CREATE TABLE IF NOT EXISTS sync_state (
    connector   TEXT PRIMARY KEY,
    cursor_json TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- Emitted documents, one row per wiki page
CREATE TABLE IF NOT EXISTS documents (
    id                  TEXT PRIMARY KEY,
    title               TEXT NOT NULL,
    semantic_identifier TEXT NOT NULL,
    sections_json       TEXT NOT NULL,
    metadata_json       TEXT NOT NULL,
    content_hash        TEXT NOT NULL,
    updated_at          TEXT NOT NULL,
    synced_at           TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_updated_at ON documents(updated_at);

-- Image attachment payloads, keyed deterministically by page + file name
CREATE TABLE IF NOT EXISTS images (
    key        TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    media_type TEXT NOT NULL,
    link       TEXT,
    data       BLOB NOT NULL,
    stored_at  TEXT NOT NULL
);

-- Sync run history
CREATE TABLE IF NOT EXISTS sync_runs (
    id          TEXT PRIMARY KEY,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
