use serde::{Deserialize, Serialize};

/// Whether a match still has local changes the remote has not seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncFlag {
    #[default]
    Pending,
    Synced,
}

impl std::fmt::Display for SyncFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncFlag::Pending => write!(f, "pending"),
            SyncFlag::Synced => write!(f, "synced"),
        }
    }
}

impl std::str::FromStr for SyncFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SyncFlag::Pending),
            "synced" => Ok(SyncFlag::Synced),
            _ => Err(format!("unknown sync flag: {s}")),
        }
    }
}

/// Counts reported by one pass over the pending queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncSummary {
    pub synced: u32,
    pub failed: u32,
}

impl SyncSummary {
    pub fn attempted(&self) -> u32 {
        self.synced + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_flag_wire_names() {
        assert_eq!(serde_json::to_string(&SyncFlag::Pending).unwrap(), "\"pending\"");
        assert_eq!(serde_json::to_string(&SyncFlag::Synced).unwrap(), "\"synced\"");
        assert_eq!("synced".parse::<SyncFlag>().unwrap(), SyncFlag::Synced);
        assert!("done".parse::<SyncFlag>().is_err());
    }

    #[test]
    fn test_summary_attempted() {
        let summary = SyncSummary { synced: 2, failed: 1 };
        assert_eq!(summary.attempted(), 3);
        assert_eq!(SyncSummary::default().attempted(), 0);
    }
}
