use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use url::Url;

use rally_core::error::RallyError;
use rally_core::models::http::{strip_search, CachedResponse};

/// Named partitions of stored responses, searched oldest partition first.
pub trait CacheStorage: Send + Sync {
    /// Create the partition if needed.
    fn open_partition(&self, name: &str) -> Result<(), RallyError>;

    /// Store `response` for `url`, replacing any previous entry in that partition.
    fn put(&self, partition: &str, url: &Url, response: &CachedResponse) -> Result<(), RallyError>;

    /// Store a batch. Either every entry lands or none do.
    fn put_all(&self, partition: &str, entries: &[(Url, CachedResponse)]) -> Result<(), RallyError>;

    /// First match across all partitions. `ignore_search` compares URLs without query.
    fn lookup(&self, url: &Url, ignore_search: bool) -> Result<Option<CachedResponse>, RallyError>;

    /// Partition names in creation order.
    fn partitions(&self) -> Result<Vec<String>, RallyError>;

    /// Returns whether the partition existed.
    fn delete_partition(&self, name: &str) -> Result<bool, RallyError>;

    fn entry_count(&self, partition: &str) -> Result<u32, RallyError>;
}

struct MemoryEntry {
    url: String,
    url_base: String,
    response: CachedResponse,
}

/// Non-durable storage, mainly for tests.
#[derive(Default)]
pub struct MemoryCacheStorage {
    partitions: Mutex<Vec<(String, Vec<MemoryEntry>)>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(String, Vec<MemoryEntry>)>> {
        self.partitions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(
        partitions: &mut Vec<(String, Vec<MemoryEntry>)>,
        partition: &str,
        url: &Url,
        response: &CachedResponse,
    ) {
        let idx = match partitions.iter().position(|(name, _)| name == partition) {
            Some(idx) => idx,
            None => {
                partitions.push((partition.to_string(), Vec::new()));
                partitions.len() - 1
            }
        };
        let entries = &mut partitions[idx].1;
        let entry = MemoryEntry {
            url: url.to_string(),
            url_base: strip_search(url),
            response: response.clone(),
        };
        match entries.iter_mut().find(|e| e.url == entry.url) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
    }
}

impl CacheStorage for MemoryCacheStorage {
    fn open_partition(&self, name: &str) -> Result<(), RallyError> {
        let mut partitions = self.lock();
        if !partitions.iter().any(|(n, _)| n == name) {
            partitions.push((name.to_string(), Vec::new()));
        }
        Ok(())
    }

    fn put(&self, partition: &str, url: &Url, response: &CachedResponse) -> Result<(), RallyError> {
        Self::insert(&mut self.lock(), partition, url, response);
        Ok(())
    }

    fn put_all(&self, partition: &str, entries: &[(Url, CachedResponse)]) -> Result<(), RallyError> {
        let mut partitions = self.lock();
        for (url, response) in entries {
            Self::insert(&mut partitions, partition, url, response);
        }
        Ok(())
    }

    fn lookup(&self, url: &Url, ignore_search: bool) -> Result<Option<CachedResponse>, RallyError> {
        let full = url.to_string();
        let base = strip_search(url);
        let partitions = self.lock();
        let found = partitions.iter().flat_map(|(_, entries)| entries).find(|e| {
            if ignore_search {
                e.url_base == base
            } else {
                e.url == full
            }
        });
        Ok(found.map(|e| e.response.clone()))
    }

    fn partitions(&self) -> Result<Vec<String>, RallyError> {
        Ok(self.lock().iter().map(|(name, _)| name.clone()).collect())
    }

    fn delete_partition(&self, name: &str) -> Result<bool, RallyError> {
        let mut partitions = self.lock();
        let before = partitions.len();
        partitions.retain(|(n, _)| n != name);
        Ok(partitions.len() != before)
    }

    fn entry_count(&self, partition: &str) -> Result<u32, RallyError> {
        Ok(self
            .lock()
            .iter()
            .find(|(name, _)| name == partition)
            .map(|(_, entries)| entries.len() as u32)
            .unwrap_or(0))
    }
}

fn db_error(e: anyhow::Error) -> RallyError {
    RallyError::Database(e.to_string())
}

/// Durable storage on the `cache_partitions` / `cache_entries` tables.
pub struct SqliteCacheStorage {
    conn: Mutex<Connection>,
}

impl SqliteCacheStorage {
    pub fn open(path: &Path) -> Result<Self, RallyError> {
        let conn = rally_db::open_db(path).map_err(db_error)?;
        Ok(Self::from_connection(conn))
    }

    pub fn in_memory() -> Result<Self, RallyError> {
        let conn = rally_db::open_memory_db().map_err(db_error)?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, RallyError> {
        self.conn
            .lock()
            .map_err(|_| RallyError::Database("connection lock poisoned".into()))
    }
}

impl CacheStorage for SqliteCacheStorage {
    fn open_partition(&self, name: &str) -> Result<(), RallyError> {
        rally_db::ops::open_partition(&*self.conn()?, name).map_err(db_error)?;
        Ok(())
    }

    fn put(&self, partition: &str, url: &Url, response: &CachedResponse) -> Result<(), RallyError> {
        rally_db::ops::put_cache_entry(
            &*self.conn()?,
            partition,
            url.as_str(),
            &strip_search(url),
            response,
        )
        .map_err(db_error)
    }

    fn put_all(&self, partition: &str, entries: &[(Url, CachedResponse)]) -> Result<(), RallyError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RallyError::Database(e.to_string()))?;
        for (url, response) in entries {
            rally_db::ops::put_cache_entry(&tx, partition, url.as_str(), &strip_search(url), response)
                .map_err(db_error)?;
        }
        tx.commit().map_err(|e| RallyError::Database(e.to_string()))
    }

    fn lookup(&self, url: &Url, ignore_search: bool) -> Result<Option<CachedResponse>, RallyError> {
        let key = if ignore_search {
            strip_search(url)
        } else {
            url.to_string()
        };
        rally_db::ops::find_cache_entry(&*self.conn()?, &key, ignore_search).map_err(db_error)
    }

    fn partitions(&self) -> Result<Vec<String>, RallyError> {
        rally_db::ops::list_partitions(&*self.conn()?).map_err(db_error)
    }

    fn delete_partition(&self, name: &str) -> Result<bool, RallyError> {
        rally_db::ops::delete_partition(&*self.conn()?, name).map_err(db_error)
    }

    fn entry_count(&self, partition: &str) -> Result<u32, RallyError> {
        rally_db::ops::count_cache_entries(&*self.conn()?, partition).map_err(db_error)
    }
}
