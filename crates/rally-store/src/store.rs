use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};

use rally_core::error::RallyError;
use rally_core::models::match_record::{MatchRecord, MatchStatus};
use rally_core::models::player_stat::PlayerStat;
use rally_core::models::set_score::SetScore;
use rally_core::models::sync_state::SyncFlag;

use crate::keys;
use crate::kv::{KeyValueStore, MemoryKv, SqliteKv};

pub type MatchMap = BTreeMap<String, MatchRecord>;
pub type SetMap = BTreeMap<u32, SetScore>;
pub type PlayerStatMap = BTreeMap<String, PlayerStat>;

/// The `vb_matches` object as stored, before each entry is decoded.
type RawMatchMap = serde_json::Map<String, serde_json::Value>;

/// Process-wide store, opened on first use and kept for the life of the process.
static SHARED: OnceLock<Arc<LocalStore>> = OnceLock::new();

/// Typed access to the local match database.
pub struct LocalStore {
    kv: Box<dyn KeyValueStore>,
}

impl LocalStore {
    pub fn new(kv: impl KeyValueStore + 'static) -> Self {
        Self { kv: Box::new(kv) }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryKv::new())
    }

    /// Open the SQLite-backed store at `path`.
    pub fn open(path: &Path) -> Result<Self, RallyError> {
        Ok(Self::new(SqliteKv::open(path)?))
    }

    /// The shared store handle. The first call opens `path`; later calls
    /// return the same handle and ignore their argument.
    pub fn shared(path: &Path) -> Result<Arc<Self>, RallyError> {
        if let Some(store) = SHARED.get() {
            return Ok(store.clone());
        }
        let store = Arc::new(Self::open(path)?);
        Ok(SHARED.get_or_init(|| store).clone())
    }

    // ── JSON helpers ──

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.kv.get(key) {
            Ok(Some(raw)) if !raw.is_empty() => raw,
            Ok(_) => return None,
            Err(e) => {
                error!(key, error = %e, "failed to read local store key");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                error!(key, error = %e, "malformed JSON in local store, treating as absent");
                None
            }
        }
    }

    fn write_json<T: Serialize>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                error!(key, error = %e, "failed to serialize local store value");
                return;
            }
        };
        if let Err(e) = self.kv.set(key, &raw) {
            error!(key, error = %e, "failed to write local store key");
        }
    }

    fn remove_key(&self, key: &str) {
        if let Err(e) = self.kv.remove(key) {
            error!(key, error = %e, "failed to remove local store key");
        }
    }

    // ── Matches ──

    /// Entries that fail to decode are kept as stored so a write never loses them.
    pub fn save_match(&self, record: &MatchRecord) {
        let value = match serde_json::to_value(record) {
            Ok(value) => value,
            Err(e) => {
                error!(match_id = %record.match_id, error = %e, "failed to serialize match");
                return;
            }
        };
        let mut matches = self.read_raw_matches();
        matches.insert(record.match_id.clone(), value);
        self.write_json(keys::MATCHES, &matches);
    }

    pub fn get_match(&self, match_id: &str) -> Option<MatchRecord> {
        let value = self.read_raw_matches().remove(match_id)?;
        decode_match(match_id, value)
    }

    /// Every readable match. Unreadable entries are logged and skipped.
    pub fn get_all_matches(&self) -> MatchMap {
        self.read_raw_matches()
            .into_iter()
            .filter_map(|(id, value)| decode_match(&id, value).map(|record| (id, record)))
            .collect()
    }

    /// Delete a match together with its sets and player stats.
    pub fn remove_match(&self, match_id: &str) {
        let mut matches = self.read_raw_matches();
        if matches.remove(match_id).is_some() {
            self.write_json(keys::MATCHES, &matches);
        }

        self.remove_key(&keys::sets(match_id));
        self.remove_key(&keys::players(match_id));
        debug!(match_id, "removed match and its children");
    }

    fn read_raw_matches(&self) -> RawMatchMap {
        self.read_json(keys::MATCHES).unwrap_or_default()
    }

    /// In-progress matches, most recently created first.
    pub fn get_in_progress_matches(&self) -> Vec<MatchRecord> {
        let mut result: Vec<MatchRecord> = self
            .get_all_matches()
            .into_values()
            .filter(|m| m.match_status == MatchStatus::InProgress)
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result
    }

    pub fn get_pending_matches(&self) -> Vec<MatchRecord> {
        self.get_all_matches()
            .into_values()
            .filter(|m| m.sync_status == SyncFlag::Pending)
            .collect()
    }

    /// Mark a match finished. It goes back to pending so the final score is uploaded.
    pub fn complete_match(&self, match_id: &str) -> bool {
        self.update_match(match_id, |m| {
            m.match_status = MatchStatus::Completed;
            m.sync_status = SyncFlag::Pending;
        })
    }

    // ── Sets ──

    pub fn save_sets(&self, match_id: &str, sets: &SetMap) {
        self.write_json(&keys::sets(match_id), sets);
    }

    pub fn get_sets(&self, match_id: &str) -> SetMap {
        self.read_json(&keys::sets(match_id)).unwrap_or_default()
    }

    pub fn save_set(&self, match_id: &str, set_number: u32, set: &SetScore) {
        let mut sets = self.get_sets(match_id);
        sets.insert(set_number, set.clone());
        self.save_sets(match_id, &sets);
    }

    pub fn get_set(&self, match_id: &str, set_number: u32) -> Option<SetScore> {
        self.get_sets(match_id).remove(&set_number)
    }

    // ── Player stats ──

    pub fn save_all_player_stats(&self, match_id: &str, stats: &PlayerStatMap) {
        self.write_json(&keys::players(match_id), stats);
    }

    pub fn get_all_player_stats(&self, match_id: &str) -> PlayerStatMap {
        self.read_json(&keys::players(match_id)).unwrap_or_default()
    }

    pub fn save_player_stat(&self, match_id: &str, player_name: &str, stat: &PlayerStat) {
        let mut stats = self.get_all_player_stats(match_id);
        stats.insert(player_name.to_string(), *stat);
        self.save_all_player_stats(match_id, &stats);
    }

    // ── Sync status ──

    pub fn get_last_sync_time(&self) -> Option<DateTime<Utc>> {
        let raw = match self.kv.get(keys::LAST_SYNC) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                error!(key = keys::LAST_SYNC, error = %e, "failed to read last sync time");
                return None;
            }
        };
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(dt) => Some(dt.with_timezone(&Utc)),
            Err(e) => {
                warn!(value = %raw, error = %e, "unparseable last sync time");
                None
            }
        }
    }

    /// Record "now" as the last successful sync and return it.
    pub fn set_last_sync_time(&self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        if let Err(e) = self.kv.set(keys::LAST_SYNC, &stamp) {
            error!(key = keys::LAST_SYNC, error = %e, "failed to write last sync time");
        }
        now
    }

    /// Flag a match as synced. Completed matches are then dropped locally.
    pub fn mark_match_synced(&self, match_id: &str) -> bool {
        let Some(mut record) = self.get_match(match_id) else {
            return false;
        };
        record.sync_status = SyncFlag::Synced;
        self.save_match(&record);

        if record.match_status == MatchStatus::Completed {
            self.remove_match(match_id);
        }
        true
    }

    /// Requeue a match for the next sync pass.
    pub fn mark_match_pending(&self, match_id: &str) -> bool {
        self.update_match(match_id, |m| m.sync_status = SyncFlag::Pending)
    }

    fn update_match(&self, match_id: &str, change: impl FnOnce(&mut MatchRecord)) -> bool {
        match self.get_match(match_id) {
            Some(mut record) => {
                change(&mut record);
                self.save_match(&record);
                true
            }
            None => false,
        }
    }

    // ── Opponent / tournament caches ──

    pub fn cache_opponents(&self, opponents: &[String]) {
        self.write_json(keys::CACHED_OPPONENTS, &opponents);
    }

    pub fn get_cached_opponents(&self) -> Vec<String> {
        self.read_json(keys::CACHED_OPPONENTS).unwrap_or_default()
    }

    pub fn cache_tournaments(&self, tournaments: &[String]) {
        self.write_json(keys::CACHED_TOURNAMENTS, &tournaments);
    }

    pub fn get_cached_tournaments(&self) -> Vec<String> {
        self.read_json(keys::CACHED_TOURNAMENTS).unwrap_or_default()
    }
}

fn decode_match(match_id: &str, value: serde_json::Value) -> Option<MatchRecord> {
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(match_id, error = %e, "skipping unreadable match entry");
            None
        }
    }
}
