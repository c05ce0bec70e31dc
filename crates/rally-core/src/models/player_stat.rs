use serde::{Deserialize, Serialize};

/// Attacking counters for one player within one match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStat {
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub kills: u32,
    #[serde(default)]
    pub errors: u32,
}

impl PlayerStat {
    pub fn new(attempts: u32, kills: u32, errors: u32) -> Self {
        Self {
            attempts,
            kills,
            errors,
        }
    }

    /// A player who never touched the ball has nothing worth uploading.
    pub fn is_empty(&self) -> bool {
        self.attempts == 0 && self.kills == 0 && self.errors == 0
    }

    /// Attack efficiency `(kills - errors) / attempts`, if any attempts were made.
    pub fn hitting_percentage(&self) -> Option<f64> {
        if self.attempts == 0 {
            return None;
        }
        Some((self.kills as f64 - self.errors as f64) / self.attempts as f64)
    }
}
