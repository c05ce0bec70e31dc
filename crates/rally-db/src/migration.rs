use rusqlite::Connection;

use crate::schema;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(schema::CREATE_SCHEMA_VERSION)?;

    let current = get_version(conn)?;

    if current < 1 {
        migrate_v1(conn)?;
    }
    if current < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn get_version(conn: &Connection) -> anyhow::Result<i64> {
    let version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);
    Ok(version)
}

fn set_version(conn: &Connection, version: i64) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
        [version],
    )?;
    Ok(())
}

/// Migration v1: local key-value store.
fn migrate_v1(conn: &Connection) -> anyhow::Result<()> {
    tracing::info!("applying migration v1: key-value store");
    conn.execute_batch(schema::CREATE_KV_ENTRIES)?;
    set_version(conn, 1)?;
    Ok(())
}

/// Migration v2: offline response cache.
fn migrate_v2(conn: &Connection) -> anyhow::Result<()> {
    tracing::info!("applying migration v2: response cache");
    conn.execute_batch(schema::CREATE_CACHE_PARTITIONS)?;
    conn.execute_batch(schema::CREATE_CACHE_ENTRIES)?;
    conn.execute_batch(schema::CREATE_CACHE_ENTRIES_BASE_INDEX)?;
    set_version(conn, 2)?;
    Ok(())
}
