use clap::Subcommand;
use comfy_table::{Cell, Color, Table};
use rally_core::models::match_record::{MatchRecord, MatchStatus};
use rally_core::models::player_stat::PlayerStat;
use rally_core::models::set_score::SetStatus;
use rally_core::models::sync_state::SyncFlag;

use super::{find_match, open_store, short_id};

#[derive(Subcommand)]
pub enum MatchAction {
    /// Start tracking a new match
    New {
        /// Your team
        #[arg(long)]
        team: String,
        /// Opposing team
        #[arg(long)]
        opponent: String,
        #[arg(long)]
        tournament: Option<String>,
    },
    /// List matches on this device
    List {
        /// Only matches still being played, newest first
        #[arg(long, conflicts_with = "pending")]
        in_progress: bool,
        /// Only matches waiting to be synced
        #[arg(long)]
        pending: bool,
    },
    /// Show a match with its sets and player stats
    Show {
        /// Match id or unique prefix
        id: String,
    },
    /// Record the score of one set
    Score {
        /// Match id or unique prefix
        id: String,
        /// Set number, starting at 1
        set: u32,
        team1: u32,
        team2: u32,
        /// Mark the set finished
        #[arg(long)]
        done: bool,
    },
    /// Record a player's attacking stats
    Player {
        /// Match id or unique prefix
        id: String,
        name: String,
        #[arg(long, default_value_t = 0)]
        attempts: u32,
        #[arg(long, default_value_t = 0)]
        kills: u32,
        #[arg(long, default_value_t = 0)]
        errors: u32,
    },
    /// Mark a match finished
    Complete {
        /// Match id or unique prefix
        id: String,
    },
    /// Queue a match for the next sync
    Requeue {
        /// Match id or unique prefix
        id: String,
    },
    /// Delete a match and everything recorded for it
    Remove {
        /// Match id or unique prefix
        id: String,
    },
}

pub fn run(action: MatchAction) -> anyhow::Result<()> {
    let store = open_store()?;
    match action {
        MatchAction::New {
            team,
            opponent,
            tournament,
        } => {
            let record = MatchRecord::new(team, opponent, tournament);
            store.save_match(&record);
            println!(
                "Match {} created: {} vs {}",
                record.match_id, record.team1_name, record.opponent_name
            );
            Ok(())
        }
        MatchAction::List {
            in_progress,
            pending,
        } => {
            let matches = if in_progress {
                store.get_in_progress_matches()
            } else if pending {
                store.get_pending_matches()
            } else {
                let mut all: Vec<MatchRecord> = store.get_all_matches().into_values().collect();
                all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                all
            };

            if matches.is_empty() {
                println!("No matches. Use `rally match new` to start one.");
                return Ok(());
            }

            let mut table = Table::new();
            table.set_header(vec!["ID", "TEAM", "OPPONENT", "TOURNAMENT", "STATUS", "SYNC", "CREATED"]);
            for m in &matches {
                table.add_row(vec![
                    Cell::new(short_id(&m.match_id)),
                    Cell::new(&m.team1_name),
                    Cell::new(&m.opponent_name),
                    Cell::new(m.tournament.as_deref().unwrap_or("—")),
                    Cell::new(m.match_status.to_string()).fg(status_color(m.match_status)),
                    Cell::new(m.sync_status.to_string()).fg(sync_color(m.sync_status)),
                    Cell::new(m.created_at.format("%Y-%m-%d %H:%M").to_string()),
                ]);
            }
            println!("{table}");
            Ok(())
        }
        MatchAction::Show { id } => {
            let m = find_match(&store, &id)?;
            println!("Match:      {}", m.match_id);
            println!("Teams:      {} vs {}", m.team1_name, m.opponent_name);
            println!("Tournament: {}", m.tournament.as_deref().unwrap_or("—"));
            println!("Status:     {} ({})", m.match_status, m.sync_status);
            println!("Created:    {}", m.created_at.to_rfc3339());

            let sets = store.get_sets(&m.match_id);
            if !sets.is_empty() {
                let mut table = Table::new();
                table.set_header(vec!["SET", m.team1_name.as_str(), m.opponent_name.as_str(), "STATUS"]);
                for (number, set) in &sets {
                    let status = set.effective_status();
                    table.add_row(vec![
                        Cell::new(number.to_string()),
                        Cell::new(set.team1_score.to_string()),
                        Cell::new(set.team2_score.to_string()),
                        Cell::new(status.to_string()).fg(match status {
                            SetStatus::Completed => Color::Green,
                            SetStatus::InProgress => Color::Yellow,
                        }),
                    ]);
                }
                println!("{table}");
            }

            let stats = store.get_all_player_stats(&m.match_id);
            if !stats.is_empty() {
                let mut table = Table::new();
                table.set_header(vec!["PLAYER", "ATT", "K", "E", "HIT%"]);
                for (name, stat) in &stats {
                    let pct = stat
                        .hitting_percentage()
                        .map(|p| format!("{p:.3}"))
                        .unwrap_or_else(|| "—".to_string());
                    table.add_row(vec![
                        Cell::new(name),
                        Cell::new(stat.attempts.to_string()),
                        Cell::new(stat.kills.to_string()),
                        Cell::new(stat.errors.to_string()),
                        Cell::new(pct),
                    ]);
                }
                println!("{table}");
            }
            Ok(())
        }
        MatchAction::Score {
            id,
            set,
            team1,
            team2,
            done,
        } => {
            if set == 0 {
                anyhow::bail!("Set numbers start at 1");
            }
            let m = find_match(&store, &id)?;
            let mut score = store.get_set(&m.match_id, set).unwrap_or_default();
            score.team1_score = team1;
            score.team2_score = team2;
            if done {
                score.set_status = Some(SetStatus::Completed);
            }
            store.save_set(&m.match_id, set, &score);
            store.mark_match_pending(&m.match_id);
            println!("Set {set}: {} {team1} – {team2} {}", m.team1_name, m.opponent_name);
            Ok(())
        }
        MatchAction::Player {
            id,
            name,
            attempts,
            kills,
            errors,
        } => {
            if kills.saturating_add(errors) > attempts {
                anyhow::bail!("Kills plus errors cannot exceed attempts");
            }
            let m = find_match(&store, &id)?;
            store.save_player_stat(&m.match_id, &name, &PlayerStat::new(attempts, kills, errors));
            store.mark_match_pending(&m.match_id);
            println!("{name}: {attempts} att, {kills} k, {errors} e");
            Ok(())
        }
        MatchAction::Complete { id } => {
            let m = find_match(&store, &id)?;
            store.complete_match(&m.match_id);
            println!("Match {} completed and queued for sync", short_id(&m.match_id));
            Ok(())
        }
        MatchAction::Requeue { id } => {
            let m = find_match(&store, &id)?;
            store.mark_match_pending(&m.match_id);
            println!("Match {} queued for sync", short_id(&m.match_id));
            Ok(())
        }
        MatchAction::Remove { id } => {
            let m = find_match(&store, &id)?;
            store.remove_match(&m.match_id);
            println!("Match {} removed", short_id(&m.match_id));
            Ok(())
        }
    }
}

fn status_color(status: MatchStatus) -> Color {
    match status {
        MatchStatus::InProgress => Color::Yellow,
        MatchStatus::Completed => Color::Green,
    }
}

fn sync_color(flag: SyncFlag) -> Color {
    match flag {
        SyncFlag::Pending => Color::Yellow,
        SyncFlag::Synced => Color::Green,
    }
}
