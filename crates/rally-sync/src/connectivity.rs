use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rally_remote::RemoteStore;

/// A single reachability signal.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Reachability flag that callers set directly or refresh by pinging the remote.
#[derive(Debug)]
pub struct NetworkMonitor {
    online: AtomicBool,
}

impl NetworkMonitor {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    /// Returns the previous value.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            tracing::info!(online, "connectivity changed");
        }
        previous
    }

    /// Ping the remote and record whether it answered within `timeout`.
    pub async fn refresh(&self, remote: &dyn RemoteStore, timeout: Duration) -> bool {
        let online = match tokio::time::timeout(timeout, remote.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "remote ping failed");
                false
            }
            Err(_) => {
                tracing::debug!(secs = timeout.as_secs(), "remote ping timed out");
                false
            }
        };
        self.set_online(online);
        online
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for NetworkMonitor {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
