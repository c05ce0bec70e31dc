use std::sync::Arc;

use clap::Subcommand;
use console::style;
use rally_cache::{FetchOutcome, HttpFetcher, OfflineCacheProxy, ProxySettings, SqliteCacheStorage};
use rally_core::config::RallyConfig;
use rally_core::models::http::CacheRequest;
use url::Url;

#[derive(Subcommand)]
pub enum ShellAction {
    /// Download the app shell into the current cache version, then activate it
    Install,
    /// Drop cache partitions from older versions
    Activate,
    /// Resolve one request through the offline cache
    Fetch {
        /// Absolute URL, or a path relative to the app origin
        url: String,
        #[arg(long, default_value = "GET")]
        method: String,
        /// Print the response body
        #[arg(long)]
        body: bool,
    },
}

fn build_proxy(config: &RallyConfig) -> anyhow::Result<OfflineCacheProxy> {
    let storage = SqliteCacheStorage::open(&RallyConfig::db_path()?)?;
    let fetcher = HttpFetcher::new(config.request_timeout())?;
    Ok(OfflineCacheProxy::new(
        ProxySettings::from_config(config),
        Arc::new(storage),
        Arc::new(fetcher),
    ))
}

pub async fn run(action: ShellAction) -> anyhow::Result<()> {
    let config = RallyConfig::load()?;
    let proxy = build_proxy(&config)?;

    match action {
        ShellAction::Install => {
            println!("Caching app shell from {} as {}", config.app_origin, config.cache_version);
            let count = proxy.install().await?;
            let report = proxy.activate()?;
            println!("{} {count} file(s) cached", style("installed:").green().bold());
            for name in &report.deleted {
                println!("  deleted stale cache {name}");
            }
            Ok(())
        }
        ShellAction::Activate => {
            let report = proxy.activate()?;
            if report.deleted.is_empty() {
                println!("No stale caches; {} is current", config.cache_version);
            } else {
                for name in &report.deleted {
                    println!("Deleted stale cache {name}");
                }
            }
            Ok(())
        }
        ShellAction::Fetch { url, method, body } => {
            let target = match Url::parse(&url) {
                Ok(u) => u,
                Err(_) => config
                    .app_origin
                    .join(&url)
                    .map_err(|e| anyhow::anyhow!("Invalid URL '{}': {}", url, e))?,
            };
            let request = CacheRequest::new(method, target);
            let policy = proxy.classify(&request);

            match proxy.handle_fetch(&request).await {
                FetchOutcome::PassThrough => {
                    println!("{policy}: not handled by the offline cache");
                }
                FetchOutcome::Respond { response, source } => {
                    println!(
                        "{policy}: {} {} (from {source}, {} bytes)",
                        response.status,
                        response.status_text,
                        response.body.len()
                    );
                    if body {
                        println!("{}", response.body_text());
                    }
                }
            }
            Ok(())
        }
    }
}
