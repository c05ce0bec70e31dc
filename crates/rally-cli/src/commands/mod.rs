pub mod config;
pub mod lists;
pub mod matches;
pub mod remote;
pub mod shell;
pub mod status;
pub mod sync;

use std::sync::Arc;

use clap::Subcommand;
use rally_core::config::RallyConfig;
use rally_core::models::match_record::MatchRecord;
use rally_store::LocalStore;

#[derive(Subcommand)]
pub enum Command {
    /// Initialize and inspect Rally configuration
    Config {
        #[command(subcommand)]
        action: config::ConfigAction,
    },
    /// Configure the remote data API
    Remote {
        #[command(subcommand)]
        action: remote::RemoteAction,
    },
    /// Record and inspect matches
    Match {
        #[command(subcommand)]
        action: matches::MatchAction,
    },
    /// Push pending matches to the remote
    Sync(sync::SyncArgs),
    /// Show queue, connectivity and cache status
    Status,
    /// Manage cached opponent and tournament names
    Lists {
        #[command(subcommand)]
        action: lists::ListsAction,
    },
    /// Manage the offline app-shell cache
    Shell {
        #[command(subcommand)]
        action: shell::ShellAction,
    },
}

pub async fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Config { action } => config::run(action),
        Command::Remote { action } => remote::run(action).await,
        Command::Match { action } => matches::run(action),
        Command::Sync(args) => sync::run(args).await,
        Command::Status => status::run().await,
        Command::Lists { action } => lists::run(action),
        Command::Shell { action } => shell::run(action).await,
    }
}

pub(crate) fn open_store() -> anyhow::Result<Arc<LocalStore>> {
    let db_path = RallyConfig::db_path()?;
    tracing::debug!(path = %db_path.display(), "opening local store");
    Ok(LocalStore::shared(&db_path)?)
}

/// Resolve a full match id or a unique prefix of one.
pub(crate) fn find_match(store: &LocalStore, id: &str) -> anyhow::Result<MatchRecord> {
    if let Some(record) = store.get_match(id) {
        return Ok(record);
    }
    let mut candidates: Vec<MatchRecord> = store
        .get_all_matches()
        .into_values()
        .filter(|m| m.match_id.starts_with(id))
        .collect();
    match candidates.len() {
        0 => anyhow::bail!("Match '{}' not found", id),
        1 => Ok(candidates.remove(0)),
        n => anyhow::bail!("'{}' matches {} matches; use more of the id", id, n),
    }
}

pub(crate) fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
