//! Row shapes sent to the remote tables.

use chrono::{DateTime, Utc};
use serde::Serialize;

use rally_core::error::RallyError;
use rally_core::models::match_record::{MatchRecord, MatchStatus};
use rally_core::models::player_stat::PlayerStat;
use rally_core::models::set_score::{SetScore, SetStatus};

use crate::RemoteTable;

/// Implemented by every row type so callers can hand it to [`crate::RemoteStore::upsert`].
pub trait RemoteRow: Serialize {
    const TABLE: RemoteTable;

    fn to_value(&self) -> Result<serde_json::Value, RallyError> {
        Ok(serde_json::to_value(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRow {
    pub match_id: String,
    pub tournament: Option<String>,
    pub team1_name: String,
    pub opponent_name: String,
    pub match_status: MatchStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&MatchRecord> for MatchRow {
    fn from(m: &MatchRecord) -> Self {
        Self {
            match_id: m.match_id.clone(),
            tournament: m.tournament.clone().filter(|t| !t.is_empty()),
            team1_name: m.team1_name.clone(),
            opponent_name: m.opponent_name.clone(),
            match_status: m.match_status,
            created_at: m.created_at,
        }
    }
}

impl RemoteRow for MatchRow {
    const TABLE: RemoteTable = RemoteTable::Matches;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetScoreRow {
    pub match_id: String,
    pub set_number: u32,
    pub set_status: SetStatus,
    pub team1_score: u32,
    pub team1_kills: u32,
    pub team1_blocks: u32,
    pub team1_serves: u32,
    pub team1_errors: u32,
    pub team2_score: u32,
    pub team2_kills: u32,
    pub team2_blocks: u32,
    pub team2_serves: u32,
    pub team2_errors: u32,
}

impl SetScoreRow {
    pub fn new(match_id: &str, set_number: u32, set: &SetScore) -> Self {
        Self {
            match_id: match_id.to_string(),
            set_number,
            set_status: set.effective_status(),
            team1_score: set.team1_score,
            team1_kills: set.team1_kills,
            team1_blocks: set.team1_blocks,
            team1_serves: set.team1_serves,
            team1_errors: set.team1_errors,
            team2_score: set.team2_score,
            team2_kills: set.team2_kills,
            team2_blocks: set.team2_blocks,
            team2_serves: set.team2_serves,
            team2_errors: set.team2_errors,
        }
    }
}

impl RemoteRow for SetScoreRow {
    const TABLE: RemoteTable = RemoteTable::SetScores;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerStatRow {
    pub match_id: String,
    pub player_name: String,
    pub team_name: String,
    pub attempts: u32,
    pub kills: u32,
    pub errors: u32,
}

impl PlayerStatRow {
    pub fn new(match_id: &str, player_name: &str, team_name: &str, stat: &PlayerStat) -> Self {
        Self {
            match_id: match_id.to_string(),
            player_name: player_name.to_string(),
            team_name: team_name.to_string(),
            attempts: stat.attempts,
            kills: stat.kills,
            errors: stat.errors,
        }
    }
}

impl RemoteRow for PlayerStatRow {
    const TABLE: RemoteTable = RemoteTable::PlayerStats;
}
