//! Storage keys. These match what the browser build writes to `localStorage`
//! so an exported dataset can be loaded unchanged.

pub const MATCHES: &str = "vb_matches";
pub const LAST_SYNC: &str = "vb_last_sync";
pub const CACHED_OPPONENTS: &str = "vb_cached_opponents";
pub const CACHED_TOURNAMENTS: &str = "vb_cached_tournaments";

pub fn sets(match_id: &str) -> String {
    format!("vb_sets_{match_id}")
}

pub fn players(match_id: &str) -> String {
    format!("vb_players_{match_id}")
}
