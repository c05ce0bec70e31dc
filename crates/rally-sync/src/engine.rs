use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use rally_core::config::RallyConfig;
use rally_core::error::RallyError;
use rally_core::models::match_record::MatchRecord;
use rally_core::models::sync_state::SyncSummary;
use rally_remote::rows::{MatchRow, PlayerStatRow, RemoteRow, SetScoreRow};
use rally_remote::RemoteStore;
use rally_store::LocalStore;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of pushing one match to the remote.
#[derive(Debug)]
pub enum MatchSyncOutcome {
    /// Match, sets and player stats were all accepted.
    Synced,
    /// No such match locally; nothing was sent.
    NotFound,
    /// An upsert failed; later steps were skipped.
    Failed(RallyError),
}

impl MatchSyncOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, MatchSyncOutcome::Synced)
    }
}

/// Pushes pending local matches to the remote, one match at a time.
pub struct SyncEngine {
    store: Arc<LocalStore>,
    timeout: Duration,
    player_team: Option<String>,
    show_progress: bool,
    read_only: bool,
}

impl SyncEngine {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_TIMEOUT,
            player_team: None,
            show_progress: false,
            read_only: false,
        }
    }

    pub fn from_config(store: Arc<LocalStore>, config: &RallyConfig) -> Self {
        Self::new(store)
            .with_timeout(config.request_timeout())
            .with_player_team(config.player_team.clone())
            .with_read_only(config.app_mode.is_demo())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Team name stamped on uploaded player stats. Unset uses the match's own team.
    pub fn with_player_team(mut self, team: Option<String>) -> Self {
        self.player_team = team.filter(|t| !t.trim().is_empty());
        self
    }

    /// A read-only engine never sends anything, even when handed a remote.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    async fn upsert<R: RemoteRow>(&self, remote: &dyn RemoteStore, row: &R) -> Result<(), RallyError> {
        let value = row.to_value()?;
        match tokio::time::timeout(self.timeout, remote.upsert(R::TABLE, value)).await {
            Ok(result) => result,
            Err(_) => Err(RallyError::Timeout {
                operation: format!("upsert {}", R::TABLE),
                secs: self.timeout.as_secs(),
            }),
        }
    }

    async fn push_match(&self, remote: &dyn RemoteStore, record: &MatchRecord) -> Result<(), RallyError> {
        let match_id = record.match_id.as_str();
        self.upsert(remote, &MatchRow::from(record)).await?;

        for (set_number, set) in self.store.get_sets(match_id) {
            self.upsert(remote, &SetScoreRow::new(match_id, set_number, &set))
                .await?;
        }

        let team = self.player_team.as_deref().unwrap_or(&record.team1_name);
        for (player, stat) in self.store.get_all_player_stats(match_id) {
            if stat.is_empty() {
                continue;
            }
            self.upsert(remote, &PlayerStatRow::new(match_id, &player, team, &stat))
                .await?;
        }
        Ok(())
    }

    /// Upload one match with its sets and non-empty player stats.
    ///
    /// Leaves the local sync flag alone; see [`SyncEngine::sync_all_pending`].
    pub async fn sync_match(&self, remote: &dyn RemoteStore, match_id: &str) -> MatchSyncOutcome {
        let Some(record) = self.store.get_match(match_id) else {
            debug!(match_id, "match not found locally, nothing to sync");
            return MatchSyncOutcome::NotFound;
        };
        match self.push_match(remote, &record).await {
            Ok(()) => MatchSyncOutcome::Synced,
            Err(e) => {
                warn!(match_id, error = %e, "match sync failed");
                MatchSyncOutcome::Failed(e)
            }
        }
    }

    /// Push every pending match. With no remote configured, or in read-only
    /// mode, this is a no-op.
    pub async fn sync_all_pending(&self, remote: Option<&dyn RemoteStore>) -> SyncSummary {
        let mut summary = SyncSummary::default();
        if self.read_only {
            debug!("read-only mode, skipping sync");
            return summary;
        }
        let Some(remote) = remote else {
            debug!("no remote configured, skipping sync");
            return summary;
        };

        let pending = self.store.get_pending_matches();
        let spinner = (self.show_progress && !pending.is_empty()).then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::with_template("{spinner:.green} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });

        for record in pending {
            if let Some(pb) = &spinner {
                pb.set_message(format!(
                    "syncing {} vs {}",
                    record.team1_name, record.opponent_name
                ));
            }
            match self.sync_match(remote, &record.match_id).await {
                MatchSyncOutcome::Synced => {
                    self.store.mark_match_synced(&record.match_id);
                    summary.synced += 1;
                }
                MatchSyncOutcome::NotFound | MatchSyncOutcome::Failed(_) => summary.failed += 1,
            }
        }

        if summary.synced > 0 {
            self.store.set_last_sync_time();
        }
        if let Some(pb) = spinner {
            pb.finish_with_message(format!(
                "{} synced, {} failed",
                summary.synced, summary.failed
            ));
        }
        info!(synced = summary.synced, failed = summary.failed, "sync pass finished");
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rally_core::models::match_record::MatchStatus;
    use rally_core::models::player_stat::PlayerStat;
    use rally_core::models::set_score::SetScore;
    use rally_core::models::sync_state::SyncFlag;
    use rally_remote::memory::MemoryRemote;
    use rally_remote::RemoteTable;

    fn store_with_match(team: &str, opponent: &str) -> (Arc<LocalStore>, MatchRecord) {
        let store = Arc::new(LocalStore::in_memory());
        let record = MatchRecord::new(team.into(), opponent.into(), Some("Winter Open".into()));
        store.save_match(&record);
        (store, record)
    }

    #[tokio::test]
    async fn test_sync_match_sends_rows_in_order() {
        let (store, record) = store_with_match("Eclipse", "Storm");
        let id = record.match_id.clone();
        store.save_set(&id, 2, &SetScore::with_scores(20, 25));
        store.save_set(&id, 1, &SetScore::with_scores(25, 21));
        store.save_player_stat(&id, "Avery", &PlayerStat::new(12, 6, 2));
        store.save_player_stat(&id, "Blake", &PlayerStat::default());

        let remote = MemoryRemote::new();
        let engine = SyncEngine::new(store.clone());
        assert!(engine.sync_match(&remote, &id).await.is_synced());

        let calls = remote.calls();
        let tables: Vec<RemoteTable> = calls.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            tables,
            vec![
                RemoteTable::Matches,
                RemoteTable::SetScores,
                RemoteTable::SetScores,
                RemoteTable::PlayerStats,
            ]
        );
        assert_eq!(calls[1].1["set_number"], 1);
        assert_eq!(calls[2].1["set_number"], 2);
        assert_eq!(calls[3].1["player_name"], "Avery");
        assert_eq!(calls[3].1["team_name"], "Eclipse");
        assert_eq!(calls[0].1["tournament"], "Winter Open");

        // The flag is only changed by the batch pass.
        assert_eq!(store.get_match(&id).unwrap().sync_status, SyncFlag::Pending);
    }

    #[tokio::test]
    async fn test_configured_player_team_is_used() {
        let (store, record) = store_with_match("Eclipse", "Storm");
        store.save_player_stat(&record.match_id, "Avery", &PlayerStat::new(1, 1, 0));
        let remote = MemoryRemote::new();
        let engine = SyncEngine::new(store).with_player_team(Some("Eclipse 16U".into()));

        engine.sync_match(&remote, &record.match_id).await;
        let rows = remote.rows(RemoteTable::PlayerStats);
        assert_eq!(rows[0]["team_name"], "Eclipse 16U");
    }

    #[tokio::test]
    async fn test_sync_match_not_found() {
        let store = Arc::new(LocalStore::in_memory());
        let remote = MemoryRemote::new();
        let outcome = SyncEngine::new(store).sync_match(&remote, "missing").await;
        assert!(matches!(outcome, MatchSyncOutcome::NotFound));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_first_failure_aborts_match() {
        let (store, record) = store_with_match("Eclipse", "Storm");
        store.save_set(&record.match_id, 1, &SetScore::with_scores(25, 10));
        store.save_player_stat(&record.match_id, "Avery", &PlayerStat::new(3, 1, 0));

        let remote = MemoryRemote::new();
        remote.fail_table(RemoteTable::SetScores);
        let outcome = SyncEngine::new(store).sync_match(&remote, &record.match_id).await;

        assert!(matches!(outcome, MatchSyncOutcome::Failed(RallyError::ApiError { .. })));
        assert_eq!(remote.calls().len(), 2);
        assert!(remote.rows(RemoteTable::PlayerStats).is_empty());
    }

    #[tokio::test]
    async fn test_sync_all_pending_mixed_results() {
        let store = Arc::new(LocalStore::in_memory());
        let mut good = MatchRecord::new("Eclipse".into(), "Storm".into(), None);
        good.match_status = MatchStatus::Completed;
        let bad = MatchRecord::new("Eclipse".into(), "Thunder".into(), None);
        let mut already = MatchRecord::new("Eclipse".into(), "Blaze".into(), None);
        already.sync_status = SyncFlag::Synced;
        for m in [&good, &bad, &already] {
            store.save_match(m);
        }
        store.save_set(&good.match_id, 1, &SetScore::with_scores(25, 19));

        let remote = MemoryRemote::new();
        remote.fail_match(&bad.match_id);
        let engine = SyncEngine::new(store.clone());
        let summary = engine.sync_all_pending(Some(&remote)).await;

        assert_eq!(summary, SyncSummary { synced: 1, failed: 1 });
        // Completed and synced: dropped locally along with its sets.
        assert!(store.get_match(&good.match_id).is_none());
        assert!(store.get_sets(&good.match_id).is_empty());
        // Failed: still queued.
        assert!(store.get_match(&bad.match_id).unwrap().is_pending());
        assert!(store.get_match(&already.match_id).is_some());
        assert!(store.get_last_sync_time().is_some());
        assert_eq!(remote.rows(RemoteTable::Matches).len(), 1);
    }

    #[tokio::test]
    async fn test_in_progress_match_stays_after_sync() {
        let (store, record) = store_with_match("Eclipse", "Storm");
        let remote = MemoryRemote::new();
        let summary = SyncEngine::new(store.clone())
            .sync_all_pending(Some(&remote))
            .await;

        assert_eq!(summary.synced, 1);
        let kept = store.get_match(&record.match_id).unwrap();
        assert_eq!(kept.sync_status, SyncFlag::Synced);
    }

    #[tokio::test]
    async fn test_no_remote_is_noop() {
        let (store, record) = store_with_match("Eclipse", "Storm");
        let summary = SyncEngine::new(store.clone()).sync_all_pending(None).await;

        assert_eq!(summary, SyncSummary::default());
        assert!(store.get_match(&record.match_id).unwrap().is_pending());
        assert!(store.get_last_sync_time().is_none());
    }

    #[tokio::test]
    async fn test_demo_mode_sends_nothing() {
        let (store, record) = store_with_match("Eclipse", "Storm");
        store.save_set(&record.match_id, 1, &SetScore::with_scores(25, 20));
        let config = RallyConfig {
            app_mode: rally_core::config::AppMode::Demo,
            ..RallyConfig::default()
        };
        let remote = MemoryRemote::new();
        let summary = SyncEngine::from_config(store.clone(), &config)
            .sync_all_pending(Some(&remote))
            .await;

        assert_eq!(summary, SyncSummary::default());
        assert!(remote.calls().is_empty());
        assert!(store.get_match(&record.match_id).unwrap().is_pending());
        assert!(store.get_last_sync_time().is_none());
    }

    #[tokio::test]
    async fn test_all_failed_leaves_last_sync_untouched() {
        let (store, _) = store_with_match("Eclipse", "Storm");
        let remote = MemoryRemote::new();
        remote.set_offline(true);
        let summary = SyncEngine::new(store.clone())
            .sync_all_pending(Some(&remote))
            .await;

        assert_eq!(summary, SyncSummary { synced: 0, failed: 1 });
        assert!(store.get_last_sync_time().is_none());
        assert_eq!(store.get_pending_matches().len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_sync_is_idempotent() {
        let (store, record) = store_with_match("Eclipse", "Storm");
        store.save_set(&record.match_id, 1, &SetScore::with_scores(25, 23));
        let remote = MemoryRemote::new();
        let engine = SyncEngine::new(store.clone());

        engine.sync_match(&remote, &record.match_id).await;
        store.save_set(&record.match_id, 1, &SetScore::with_scores(25, 24));
        engine.sync_match(&remote, &record.match_id).await;

        let sets = remote.rows(RemoteTable::SetScores);
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0]["team2_score"], 24);
        assert_eq!(remote.rows(RemoteTable::Matches).len(), 1);
    }

    #[tokio::test]
    async fn test_slow_upsert_times_out() {
        let (store, record) = store_with_match("Eclipse", "Storm");
        let remote = MemoryRemote::new();
        remote.set_delay(Duration::from_secs(30));
        let engine = SyncEngine::new(store.clone()).with_timeout(Duration::from_secs(1));

        let outcome = engine.sync_match(&remote, &record.match_id).await;
        assert!(matches!(
            outcome,
            MatchSyncOutcome::Failed(RallyError::Timeout { secs: 1, .. })
        ));

        let summary = engine.sync_all_pending(Some(&remote)).await;
        assert_eq!(summary, SyncSummary { synced: 0, failed: 1 });
        assert!(store.get_match(&record.match_id).unwrap().is_pending());
    }
}
