use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use rally_core::error::RallyError;

use crate::{RemoteStore, RemoteTable};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-process remote that applies upserts to a map keyed by each table's
/// conflict key and records every call. Failures and latency can be injected.
#[derive(Default)]
pub struct MemoryRemote {
    rows: Mutex<BTreeMap<(RemoteTable, String), serde_json::Value>>,
    calls: Mutex<Vec<(RemoteTable, serde_json::Value)>>,
    failing_tables: Mutex<HashSet<RemoteTable>>,
    failing_matches: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
    offline: AtomicBool,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every upsert into `table`.
    pub fn fail_table(&self, table: RemoteTable) {
        lock(&self.failing_tables).insert(table);
    }

    /// Reject every upsert whose row carries this `match_id`.
    pub fn fail_match(&self, match_id: &str) {
        lock(&self.failing_matches).insert(match_id.to_string());
    }

    /// Sleep this long before answering each upsert.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Every upsert received, in order, including rejected ones.
    pub fn calls(&self) -> Vec<(RemoteTable, serde_json::Value)> {
        lock(&self.calls).clone()
    }

    /// Stored rows for one table, ordered by conflict key.
    pub fn rows(&self, table: RemoteTable) -> Vec<serde_json::Value> {
        self.rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|((t, _), _)| *t == table)
            .map(|(_, row)| row.clone())
            .collect()
    }

    fn conflict_value(table: RemoteTable, row: &serde_json::Value) -> String {
        table
            .conflict_key()
            .split(',')
            .map(|col| row.get(col).map(|v| v.to_string()).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("|")
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn upsert(&self, table: RemoteTable, row: serde_json::Value) -> Result<(), RallyError> {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.calls).push((table, row.clone()));

        if self.offline.load(Ordering::SeqCst) {
            return Err(RallyError::Network {
                message: "remote unreachable".into(),
            });
        }
        let match_id = row.get("match_id").and_then(|v| v.as_str()).unwrap_or_default();
        if lock(&self.failing_tables).contains(&table)
            || lock(&self.failing_matches).contains(match_id)
        {
            return Err(RallyError::ApiError {
                status: 500,
                message: format!("rejected upsert into {table}"),
            });
        }

        let key = Self::conflict_value(table, &row);
        let mut rows = lock(&self.rows);
        match rows.get_mut(&(table, key.clone())) {
            Some(serde_json::Value::Object(existing)) => {
                if let serde_json::Value::Object(incoming) = row {
                    existing.extend(incoming);
                }
            }
            _ => {
                rows.insert((table, key), row);
            }
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), RallyError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RallyError::Network {
                message: "remote unreachable".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_merges_on_conflict_key() {
        let remote = MemoryRemote::new();
        remote
            .upsert(RemoteTable::SetScores, json!({"match_id": "m1", "set_number": 1, "team1_score": 10}))
            .await
            .unwrap();
        remote
            .upsert(RemoteTable::SetScores, json!({"match_id": "m1", "set_number": 1, "team1_score": 25}))
            .await
            .unwrap();
        remote
            .upsert(RemoteTable::SetScores, json!({"match_id": "m1", "set_number": 2, "team1_score": 3}))
            .await
            .unwrap();

        let rows = remote.rows(RemoteTable::SetScores);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["team1_score"], 25);
        assert_eq!(remote.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let remote = MemoryRemote::new();
        remote.fail_table(RemoteTable::PlayerStats);
        assert!(remote
            .upsert(RemoteTable::PlayerStats, json!({"match_id": "m1", "player_name": "A"}))
            .await
            .is_err());

        remote.fail_match("m2");
        assert!(remote
            .upsert(RemoteTable::Matches, json!({"match_id": "m2"}))
            .await
            .is_err());
        assert!(remote
            .upsert(RemoteTable::Matches, json!({"match_id": "m1"}))
            .await
            .is_ok());

        remote.set_offline(true);
        assert!(remote.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_poisoned_lock_still_records() {
        let remote = std::sync::Arc::new(MemoryRemote::new());
        let poisoner = remote.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.calls.lock().unwrap();
            panic!("observer crashed while holding the lock");
        })
        .join();

        remote
            .upsert(RemoteTable::Matches, json!({"match_id": "m1"}))
            .await
            .unwrap();
        assert_eq!(remote.calls().len(), 1);
        assert_eq!(remote.rows(RemoteTable::Matches).len(), 1);
    }
}
