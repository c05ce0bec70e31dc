pub mod connectivity;
pub mod engine;

pub use connectivity::{Connectivity, NetworkMonitor};
pub use engine::{MatchSyncOutcome, SyncEngine};
