use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use rally_core::models::http::CachedResponse;

// ── Helpers ──

fn fmt_dt(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn now() -> String {
    fmt_dt(&Utc::now())
}

// ── Key-value entries ──

pub fn kv_get(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM kv_entries WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn kv_set(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, now()],
    )?;
    Ok(())
}

pub fn kv_remove(conn: &Connection, key: &str) -> anyhow::Result<()> {
    conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
    Ok(())
}

pub fn kv_keys(conn: &Connection) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT key FROM kv_entries ORDER BY key")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

// ── Cache partitions ──

/// Create the partition if it does not exist yet and return its id.
pub fn open_partition(conn: &Connection, name: &str) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO cache_partitions (name, created_at) VALUES (?1, ?2)",
        params![name, now()],
    )?;
    let id = conn.query_row(
        "SELECT id FROM cache_partitions WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Partition names in creation order.
pub fn list_partitions(conn: &Connection) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM cache_partitions ORDER BY id")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

/// Delete a partition and every entry in it. Returns whether it existed.
pub fn delete_partition(conn: &Connection, name: &str) -> anyhow::Result<bool> {
    let removed = conn.execute(
        "DELETE FROM cache_partitions WHERE name = ?1",
        params![name],
    )?;
    Ok(removed > 0)
}

// ── Cache entries ──

pub fn put_cache_entry(
    conn: &Connection,
    partition: &str,
    url: &str,
    url_base: &str,
    response: &CachedResponse,
) -> anyhow::Result<()> {
    let partition_id = open_partition(conn, partition)?;
    let headers_json = serde_json::to_string(&response.headers)?;
    conn.execute(
        "INSERT OR REPLACE INTO cache_entries (partition_id, url, url_base, status, status_text, headers, body, stored_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            partition_id,
            url,
            url_base,
            response.status as i64,
            response.status_text,
            headers_json,
            response.body,
            now(),
        ],
    )?;
    Ok(())
}

/// Find a cached response across all partitions, oldest partition first.
///
/// With `ignore_search`, `url_base` is compared instead of the full URL.
pub fn find_cache_entry(
    conn: &Connection,
    url: &str,
    ignore_search: bool,
) -> anyhow::Result<Option<CachedResponse>> {
    let sql = if ignore_search {
        "SELECT e.status, e.status_text, e.headers, e.body
         FROM cache_entries e JOIN cache_partitions p ON p.id = e.partition_id
         WHERE e.url_base = ?1 ORDER BY p.id, e.rowid LIMIT 1"
    } else {
        "SELECT e.status, e.status_text, e.headers, e.body
         FROM cache_entries e JOIN cache_partitions p ON p.id = e.partition_id
         WHERE e.url = ?1 ORDER BY p.id LIMIT 1"
    };
    let found = conn
        .query_row(sql, params![url], row_to_response)
        .optional()?;
    Ok(found)
}

pub fn count_cache_entries(conn: &Connection, partition: &str) -> anyhow::Result<u32> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM cache_entries e JOIN cache_partitions p ON p.id = e.partition_id
         WHERE p.name = ?1",
        params![partition],
        |row| row.get(0),
    )?;
    Ok(count as u32)
}

fn row_to_response(row: &rusqlite::Row) -> rusqlite::Result<CachedResponse> {
    let status: i64 = row.get(0)?;
    let status_text: String = row.get(1)?;
    let headers_str: String = row.get(2)?;
    let body: Vec<u8> = row.get(3)?;

    Ok(CachedResponse {
        status: status as u16,
        status_text,
        headers: serde_json::from_str(&headers_str).unwrap_or_default(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{open_db, open_memory_db};

    #[test]
    fn test_kv_crud() {
        let conn = open_memory_db().unwrap();
        assert_eq!(kv_get(&conn, "vb_matches").unwrap(), None);

        kv_set(&conn, "vb_matches", "{}").unwrap();
        kv_set(&conn, "vb_matches", "{\"a\":1}").unwrap();
        assert_eq!(kv_get(&conn, "vb_matches").unwrap().as_deref(), Some("{\"a\":1}"));

        kv_set(&conn, "vb_last_sync", "2025-01-01T00:00:00Z").unwrap();
        assert_eq!(kv_keys(&conn).unwrap(), vec!["vb_last_sync", "vb_matches"]);

        kv_remove(&conn, "vb_matches").unwrap();
        kv_remove(&conn, "never-existed").unwrap();
        assert_eq!(kv_get(&conn, "vb_matches").unwrap(), None);
    }

    #[test]
    fn test_kv_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rally.db");
        {
            let conn = open_db(&path).unwrap();
            kv_set(&conn, "vb_cached_opponents", "[\"Storm\"]").unwrap();
        }
        let conn = open_db(&path).unwrap();
        assert_eq!(
            kv_get(&conn, "vb_cached_opponents").unwrap().as_deref(),
            Some("[\"Storm\"]")
        );
    }

    #[test]
    fn test_partitions_in_creation_order() {
        let conn = open_memory_db().unwrap();
        open_partition(&conn, "vb-tracker-v7").unwrap();
        open_partition(&conn, "vb-tracker-v8").unwrap();
        open_partition(&conn, "vb-tracker-v7").unwrap();
        assert_eq!(
            list_partitions(&conn).unwrap(),
            vec!["vb-tracker-v7", "vb-tracker-v8"]
        );

        assert!(delete_partition(&conn, "vb-tracker-v7").unwrap());
        assert!(!delete_partition(&conn, "vb-tracker-v7").unwrap());
        assert_eq!(list_partitions(&conn).unwrap(), vec!["vb-tracker-v8"]);
    }

    #[test]
    fn test_cache_entry_lookup_and_cascade() {
        let conn = open_memory_db().unwrap();
        let page = CachedResponse::new(200, "OK", "<html>tracker</html>")
            .with_header("Content-Type", "text/html");
        put_cache_entry(
            &conn,
            "vb-tracker-v8",
            "https://app.test/tracker.html",
            "https://app.test/tracker.html",
            &page,
        )
        .unwrap();

        let exact = find_cache_entry(&conn, "https://app.test/tracker.html", false).unwrap();
        assert_eq!(exact.as_ref(), Some(&page));

        // A query string only matches when searching by base URL.
        let with_query = url::Url::parse("https://app.test/tracker.html?matchId=7").unwrap();
        assert!(find_cache_entry(&conn, with_query.as_str(), false).unwrap().is_none());
        let base = rally_core::models::http::strip_search(&with_query);
        assert!(find_cache_entry(&conn, &base, true).unwrap().is_some());

        assert_eq!(count_cache_entries(&conn, "vb-tracker-v8").unwrap(), 1);
        delete_partition(&conn, "vb-tracker-v8").unwrap();
        assert!(find_cache_entry(&conn, &base, true).unwrap().is_none());
    }

    #[test]
    fn test_put_overwrites_same_url() {
        let conn = open_memory_db().unwrap();
        let url = "https://app.test/index.html";
        put_cache_entry(&conn, "v1", url, url, &CachedResponse::new(200, "OK", "old")).unwrap();
        put_cache_entry(&conn, "v1", url, url, &CachedResponse::new(200, "OK", "new")).unwrap();
        assert_eq!(count_cache_entries(&conn, "v1").unwrap(), 1);
        let found = find_cache_entry(&conn, url, false).unwrap().unwrap();
        assert_eq!(found.body_text(), "new");
    }
}
