use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::sync_state::SyncFlag;

/// Generate a fresh match identifier.
///
/// UUID v4 carries 122 random bits, which is plenty for a primary key that
/// must never collide across the lifetime of a device's dataset.
pub fn new_match_id() -> String {
    Uuid::new_v4().to_string()
}

/// Lifecycle of a match on the scoring side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    #[default]
    InProgress,
    Completed,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::InProgress => write!(f, "in_progress"),
            MatchStatus::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(MatchStatus::InProgress),
            "completed" => Ok(MatchStatus::Completed),
            _ => Err(format!("unknown match status: {s}")),
        }
    }
}

/// A tracked match as persisted under `vb_matches`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: String,
    pub team1_name: String,
    pub opponent_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tournament: Option<String>,
    #[serde(default)]
    pub match_status: MatchStatus,
    #[serde(default)]
    pub sync_status: SyncFlag,
    pub created_at: DateTime<Utc>,
    /// Fields written by other clients that this crate does not model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MatchRecord {
    pub fn new(team1_name: String, opponent_name: String, tournament: Option<String>) -> Self {
        Self {
            match_id: new_match_id(),
            team1_name,
            opponent_name,
            tournament: tournament.filter(|t| !t.trim().is_empty()),
            match_status: MatchStatus::InProgress,
            sync_status: SyncFlag::Pending,
            created_at: Utc::now(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.match_status == MatchStatus::Completed
    }

    pub fn is_pending(&self) -> bool {
        self.sync_status == SyncFlag::Pending
    }
}
