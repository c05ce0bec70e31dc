/// SQL statements for creating the Rally database schema.

pub const CREATE_SCHEMA_VERSION: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TEXT NOT NULL
)";

/// Backing table for the local match store. Values are opaque strings (JSON).
pub const CREATE_KV_ENTRIES: &str = "
CREATE TABLE IF NOT EXISTS kv_entries (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    updated_at  TEXT NOT NULL
)";

pub const CREATE_CACHE_PARTITIONS: &str = "
CREATE TABLE IF NOT EXISTS cache_partitions (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL
)";

pub const CREATE_CACHE_ENTRIES: &str = "
CREATE TABLE IF NOT EXISTS cache_entries (
    partition_id    INTEGER NOT NULL,
    url             TEXT NOT NULL,
    url_base        TEXT NOT NULL,
    status          INTEGER NOT NULL,
    status_text     TEXT NOT NULL DEFAULT '',
    headers         TEXT NOT NULL DEFAULT '[]',
    body            BLOB NOT NULL,
    stored_at       TEXT NOT NULL,
    PRIMARY KEY (partition_id, url),
    FOREIGN KEY (partition_id) REFERENCES cache_partitions(id) ON DELETE CASCADE
)";

pub const CREATE_CACHE_ENTRIES_BASE_INDEX: &str = "
CREATE INDEX IF NOT EXISTS idx_cache_entries_url_base ON cache_entries (url_base)";

