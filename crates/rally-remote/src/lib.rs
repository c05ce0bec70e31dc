pub mod memory;
pub mod rows;
pub mod supabase;

use async_trait::async_trait;
use rally_auth::CredentialStore;
use rally_core::config::RallyConfig;
use rally_core::error::RallyError;

/// Remote tables the sync engine writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RemoteTable {
    Matches,
    SetScores,
    PlayerStats,
}

impl RemoteTable {
    pub fn name(&self) -> &'static str {
        match self {
            RemoteTable::Matches => "matches",
            RemoteTable::SetScores => "set_scores",
            RemoteTable::PlayerStats => "player_stats",
        }
    }

    /// Natural key the remote uses to merge a repeated upsert into the existing row.
    pub fn conflict_key(&self) -> &'static str {
        match self {
            RemoteTable::Matches => "match_id",
            RemoteTable::SetScores => "match_id,set_number",
            RemoteTable::PlayerStats => "match_id,player_name",
        }
    }
}

impl std::fmt::Display for RemoteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for RemoteTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "matches" => Ok(RemoteTable::Matches),
            "set_scores" => Ok(RemoteTable::SetScores),
            "player_stats" => Ok(RemoteTable::PlayerStats),
            _ => Err(format!("unknown remote table: {s}")),
        }
    }
}

/// Trait for the remote relational store that receives match data.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Insert `row`, or merge it into the row sharing the table's conflict key.
    async fn upsert(&self, table: RemoteTable, row: serde_json::Value) -> Result<(), RallyError>;

    /// Succeeds if the remote answered at all.
    async fn ping(&self) -> Result<(), RallyError>;
}

/// Build the configured remote, or `None` when running offline-only.
///
/// A missing URL or a missing API key both mean "no remote configured";
/// neither is an error. Demo mode never builds a remote.
pub fn create_remote(
    config: &RallyConfig,
    credentials: &dyn CredentialStore,
) -> Result<Option<Box<dyn RemoteStore>>, RallyError> {
    if config.app_mode.is_demo() {
        tracing::debug!("demo mode, remote writes disabled");
        return Ok(None);
    }
    let Some(url) = &config.remote_url else {
        tracing::debug!("no remote_url configured, running offline-only");
        return Ok(None);
    };
    let Some(api_key) = credentials.get(&config.credential_key)? else {
        tracing::warn!(key = %config.credential_key, "remote_url set but no API key stored");
        return Ok(None);
    };

    let remote = supabase::SupabaseRemote::new(url.clone(), api_key, config.request_timeout())?;
    Ok(Some(Box::new(remote)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rally_auth::MemoryStore;
    use rally_core::config::AppMode;

    #[test]
    fn test_table_names_and_keys() {
        assert_eq!(RemoteTable::Matches.to_string(), "matches");
        assert_eq!(RemoteTable::SetScores.conflict_key(), "match_id,set_number");
        assert_eq!(RemoteTable::PlayerStats.conflict_key(), "match_id,player_name");
        assert_eq!("set_scores".parse::<RemoteTable>().unwrap(), RemoteTable::SetScores);
        assert!("sets".parse::<RemoteTable>().is_err());
    }

    #[test]
    fn test_create_remote_unconfigured() {
        let creds = MemoryStore::new();
        let config = RallyConfig::default();
        assert!(create_remote(&config, &creds).unwrap().is_none());

        let config = RallyConfig {
            remote_url: Some("https://demo.supabase.co".parse().unwrap()),
            ..RallyConfig::default()
        };
        assert!(create_remote(&config, &creds).unwrap().is_none());

        creds.store(&config.credential_key, "anon-key").unwrap();
        assert!(create_remote(&config, &creds).unwrap().is_some());
    }

    #[test]
    fn test_create_remote_demo_mode() {
        let creds = MemoryStore::new();
        let config = RallyConfig {
            app_mode: AppMode::Demo,
            remote_url: Some("https://demo.supabase.co".parse().unwrap()),
            ..RallyConfig::default()
        };
        creds.store(&config.credential_key, "anon-key").unwrap();
        assert!(create_remote(&config, &creds).unwrap().is_none());
    }
}
