pub mod http;
pub mod match_record;
pub mod player_stat;
pub mod set_score;
pub mod sync_state;
