//! Local-first persistence for matches, sets, player stats and small caches.
//!
//! Everything is stored as JSON strings under fixed keys of a [`KeyValueStore`].
//! [`LocalStore`] never returns storage errors: failed reads come back empty
//! and failed writes are logged and dropped.

pub mod keys;
pub mod kv;
pub mod store;

pub use kv::{KeyValueStore, MemoryKv, SqliteKv};
pub use store::{LocalStore, MatchMap, PlayerStatMap, SetMap};

pub use rally_core::models::match_record::new_match_id;
