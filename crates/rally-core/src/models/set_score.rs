use serde::{Deserialize, Serialize};

/// Per-set lifecycle as recorded by the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetStatus {
    #[default]
    InProgress,
    Completed,
}

impl std::fmt::Display for SetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetStatus::InProgress => write!(f, "in_progress"),
            SetStatus::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for SetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(SetStatus::InProgress),
            "completed" => Ok(SetStatus::Completed),
            _ => Err(format!("unknown set status: {s}")),
        }
    }
}

/// Scoring detail for one set. Counters missing from stored JSON read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetScore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_status: Option<SetStatus>,
    #[serde(default)]
    pub team1_score: u32,
    #[serde(default)]
    pub team1_kills: u32,
    #[serde(default)]
    pub team1_blocks: u32,
    #[serde(default)]
    pub team1_serves: u32,
    #[serde(default)]
    pub team1_errors: u32,
    #[serde(default)]
    pub team2_score: u32,
    #[serde(default)]
    pub team2_kills: u32,
    #[serde(default)]
    pub team2_blocks: u32,
    #[serde(default)]
    pub team2_serves: u32,
    #[serde(default)]
    pub team2_errors: u32,
}

impl SetScore {
    pub fn with_scores(team1_score: u32, team2_score: u32) -> Self {
        Self {
            team1_score,
            team2_score,
            ..Self::default()
        }
    }

    /// Status to report upstream; unset sets are still being played.
    pub fn effective_status(&self) -> SetStatus {
        self.set_status.unwrap_or_default()
    }
}
