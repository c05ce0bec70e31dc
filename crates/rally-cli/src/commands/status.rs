use console::style;
use rally_auth::KeyringStore;
use rally_cache::{CacheStorage, SqliteCacheStorage};
use rally_core::config::RallyConfig;
use rally_sync::{Connectivity, NetworkMonitor};

pub async fn run() -> anyhow::Result<()> {
    let config = RallyConfig::load()?;
    let store = super::open_store()?;

    let all = store.get_all_matches();
    let in_progress = store.get_in_progress_matches().len();
    let pending = store.get_pending_matches().len();
    let last_sync = store
        .get_last_sync_time()
        .map(|dt| dt.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string());

    println!("Matches:     {} ({} in progress)", all.len(), in_progress);
    println!("Pending:     {}", pending);
    println!("Last sync:   {}", last_sync);

    let creds = KeyringStore::new();
    match rally_remote::create_remote(&config, &creds)? {
        Some(remote) => {
            let monitor = NetworkMonitor::default();
            monitor.refresh(remote.as_ref(), config.request_timeout()).await;
            let state = if monitor.is_online() {
                style("online").green()
            } else {
                style("offline").yellow()
            };
            let url = config.remote_url.as_ref().map(|u| u.as_str()).unwrap_or_default();
            println!("Remote:      {} ({})", url, state);
        }
        None if config.app_mode.is_demo() => {
            println!("Remote:      {}", style("disabled (demo mode)").dim())
        }
        None => println!("Remote:      {}", style("not configured").dim()),
    }

    let cache = SqliteCacheStorage::open(&RallyConfig::db_path()?)?;
    let partitions = cache.partitions()?;
    let current = cache.entry_count(&config.cache_version)?;
    println!(
        "App shell:   {} ({} of {} cached)",
        config.cache_version,
        current,
        config.app_shell.len()
    );
    let stale: Vec<&String> = partitions
        .iter()
        .filter(|p| **p != config.cache_version)
        .collect();
    if !stale.is_empty() {
        println!(
            "             {} stale partition(s); run `rally shell activate`",
            stale.len()
        );
    }
    Ok(())
}
