use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use rally_core::error::RallyError;
use rusqlite::Connection;

/// String-keyed, string-valued persistent storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, RallyError>;

    fn set(&self, key: &str, value: &str) -> Result<(), RallyError>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), RallyError>;

    fn keys(&self) -> Result<Vec<String>, RallyError>;
}

fn db_error(e: anyhow::Error) -> RallyError {
    RallyError::Database(e.to_string())
}

/// Durable backend on the `kv_entries` table.
pub struct SqliteKv {
    conn: Mutex<Connection>,
}

impl SqliteKv {
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

impl KeyValueStore for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<String>, RallyError> {
        rally_db::ops::kv_get(&*self.conn()?, key).map_err(db_error)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), RallyError> {
        rally_db::ops::kv_set(&*self.conn()?, key, value).map_err(db_error)
    }

    fn remove(&self, key: &str) -> Result<(), RallyError> {
        rally_db::ops::kv_remove(&*self.conn()?, key).map_err(db_error)
    }

    fn keys(&self) -> Result<Vec<String>, RallyError> {
        rally_db::ops::kv_keys(&*self.conn()?).map_err(db_error)
    }
}

/// In-memory backend. Can be told to fail, to exercise degraded paths.
pub struct MemoryKv {
    entries: Mutex<BTreeMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent read fail, as a corrupt store would.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail, as a full quota would.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_read(&self) -> Result<(), RallyError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RallyError::Database("simulated read failure".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), RallyError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RallyError::Database("simulated quota exceeded".into()));
        }
        Ok(())
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, RallyError> {
        self.check_read()?;
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), RallyError> {
        self.check_write()?;
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), RallyError> {
        self.check_write()?;
        self.entries().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, RallyError> {
        self.check_read()?;
        Ok(self.entries().keys().cloned().collect())
    }
}
